use apollo_compiler::Node;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use apollo_compiler::schema::Type;

use crate::error::FederationError;
use crate::internal_error;

/// How the values a non-repeatable directive argument takes in different subgraphs are merged
/// into the single value used in the supergraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentCompositionStrategy {
    Max,
    Min,
    Sum,
    Intersection,
    Union,
    NullableAnd,
    NullableMax,
    NullableUnion,
}

impl ArgumentCompositionStrategy {
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Checks that the strategy can merge values of type `ty`. On failure, returns a description
    /// of the supported types.
    pub fn is_type_supported(&self, ty: &Type) -> Result<(), String> {
        match self {
            Self::Max | Self::Min | Self::Sum => {
                support_fixed_types(ty, &[Type::Named(name!("Int")).non_null()])
            }
            Self::NullableMax => support_fixed_types(
                ty,
                &[
                    Type::Named(name!("Int")),
                    Type::Named(name!("Int")).non_null(),
                ],
            ),
            Self::NullableAnd => support_fixed_types(
                ty,
                &[
                    Type::Named(name!("Boolean")),
                    Type::Named(name!("Boolean")).non_null(),
                ],
            ),
            Self::Intersection | Self::Union => {
                if ty.is_non_null() && ty.is_list() {
                    Ok(())
                } else {
                    Err("non-nullable list types of any type".to_string())
                }
            }
            Self::NullableUnion => {
                if ty.is_list() {
                    Ok(())
                } else {
                    Err("list types of any type".to_string())
                }
            }
        }
    }

    /// Merges the values, assumed to be of a type accepted by [`Self::is_type_supported`].
    pub fn merge_values(&self, values: &[Value]) -> Result<Value, FederationError> {
        match self {
            Self::Max => Ok(ints(values)?.into_iter().max().unwrap_or_default().into()),
            Self::Min => Ok(ints(values)?.into_iter().min().unwrap_or_default().into()),
            Self::Sum => Ok(ints(values)?.into_iter().sum::<i32>().into()),
            Self::Intersection => {
                let lists = lists(values)?;
                let Some((first, rest)) = lists.split_first() else {
                    return Ok(Value::List(vec![]));
                };
                let mut result = first.to_vec();
                for list in rest {
                    result.retain(|item| list.contains(item));
                }
                Ok(Value::List(result.into_iter().map(Node::new).collect()))
            }
            Self::Union => Ok(union_of_lists(&lists(values)?)),
            Self::NullableAnd => {
                let non_null = non_null_values(values);
                if non_null.is_empty() {
                    return Ok(Value::Null);
                }
                let mut result = true;
                for value in non_null {
                    let Value::Boolean(b) = value else {
                        return Err(internal_error!("Unexpected non-boolean value {value}"));
                    };
                    result &= b;
                }
                Ok(Value::Boolean(result))
            }
            Self::NullableMax => {
                let non_null = non_null_values(values);
                if non_null.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(ints(&non_null)?.into_iter().max().unwrap_or_default().into())
            }
            Self::NullableUnion => {
                let non_null = non_null_values(values);
                if non_null.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(union_of_lists(&lists(&non_null)?))
            }
        }
    }
}

fn support_fixed_types(ty: &Type, supported_types: &[Type]) -> Result<(), String> {
    if supported_types.iter().any(|supported| supported == ty) {
        return Ok(());
    }
    let expected_types: Vec<String> = supported_types.iter().map(|ty| ty.to_string()).collect();
    Err(format!("type(s) {}", expected_types.join(", ")))
}

fn non_null_values(values: &[Value]) -> Vec<Value> {
    values
        .iter()
        .filter(|value| !matches!(value, Value::Null))
        .cloned()
        .collect()
}

fn ints(values: &[Value]) -> Result<Vec<i32>, FederationError> {
    values
        .iter()
        .map(|value| match value {
            Value::Int(i) => i
                .try_to_i32()
                .map_err(|_| internal_error!("Int value {i} does not fit 32 bits")),
            _ => Err(internal_error!("Unexpected non-int value {value}")),
        })
        .collect()
}

fn lists(values: &[Value]) -> Result<Vec<Vec<Value>>, FederationError> {
    values
        .iter()
        .map(|value| {
            value
                .as_list()
                .map(|list| list.iter().map(|item| item.as_ref().clone()).collect())
                .ok_or_else(|| internal_error!("Unexpected non-list value {value}"))
        })
        .collect()
}

fn union_of_lists(lists: &[Vec<Value>]) -> Value {
    let mut result: Vec<Value> = Vec::new();
    for item in lists.iter().flatten() {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    Value::List(result.into_iter().map(Node::new).collect())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn list(items: &[&str]) -> Value {
        Value::List(
            items
                .iter()
                .map(|s| Node::new(Value::String(s.to_string())))
                .collect(),
        )
    }

    #[rstest]
    #[case::max(ArgumentCompositionStrategy::Max, vec![3.into(), 2.into()], 3.into())]
    #[case::min(ArgumentCompositionStrategy::Min, vec![3.into(), 2.into()], 2.into())]
    #[case::sum(ArgumentCompositionStrategy::Sum, vec![1.into(), 5.into()], 6.into())]
    #[case::union(ArgumentCompositionStrategy::Union, vec![list(&["foo", "bar"]), list(&["foo"])], list(&["foo", "bar"]))]
    #[case::intersection(ArgumentCompositionStrategy::Intersection, vec![list(&["foo", "bar"]), list(&["foo"])], list(&["foo"]))]
    #[case::nullable_and(ArgumentCompositionStrategy::NullableAnd, vec![Value::Boolean(true), Value::Null, Value::Boolean(false)], Value::Boolean(false))]
    #[case::nullable_and_all_null(ArgumentCompositionStrategy::NullableAnd, vec![Value::Null, Value::Null], Value::Null)]
    #[case::nullable_max(ArgumentCompositionStrategy::NullableMax, vec![Value::Null, 4.into(), 7.into()], 7.into())]
    #[case::nullable_union(ArgumentCompositionStrategy::NullableUnion, vec![Value::Null, list(&["a"]), list(&["b", "a"])], list(&["a", "b"]))]
    fn merges_values(
        #[case] strategy: ArgumentCompositionStrategy,
        #[case] values: Vec<Value>,
        #[case] expected: Value,
    ) {
        assert_eq!(strategy.merge_values(&values).unwrap(), expected);
    }

    #[test]
    fn checks_supported_types() {
        let strategy = ArgumentCompositionStrategy::Max;
        assert!(strategy.is_type_supported(&Type::Named(name!("Int")).non_null()).is_ok());
        assert_eq!(
            strategy.is_type_supported(&Type::Named(name!("Int"))),
            Err("type(s) Int!".to_string())
        );
        assert!(
            ArgumentCompositionStrategy::Union
                .is_type_supported(&Type::Named(name!("String")).non_null().list().non_null())
                .is_ok()
        );
        assert_eq!(ArgumentCompositionStrategy::NullableUnion.name(), "NULLABLE_UNION");
    }

    #[test]
    fn rejects_unexpected_values() {
        assert!(
            ArgumentCompositionStrategy::Sum
                .merge_values(&[Value::Boolean(true)])
                .is_err()
        );
    }
}
