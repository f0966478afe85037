use apollo_compiler::schema::ExtendedType;
use pretty_assertions::assert_eq;

use super::ServiceDefinition;
use super::compose_as_fed2_subgraphs;
use super::hints;

fn field_names(schema: &apollo_compiler::Schema, type_name: &str) -> Vec<String> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(object)) => {
            object.fields.keys().map(|name| name.to_string()).collect()
        }
        Some(ExtendedType::Interface(interface)) => {
            interface.fields.keys().map(|name| name.to_string()).collect()
        }
        _ => vec![],
    }
}

#[test]
fn extracts_the_subgraphs_back_from_the_supergraph() {
    let subgraph_a = ServiceDefinition {
        name: "products",
        type_defs: r#"
            type Query {
                products: [Product]
            }

            type Product @key(fields: "upc") {
                upc: ID!
                name: String
                price: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "reviews",
        type_defs: r#"
            type Review {
                body: String
                product: Product
            }

            type Product @key(fields: "upc") {
                upc: ID!
                reviews: [Review]
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let subgraphs = supergraph.extract_subgraphs().expect("extracts");
    let names: Vec<&str> = subgraphs
        .iter()
        .map(|subgraph| subgraph.name.as_str())
        .collect();
    assert_eq!(names, ["products", "reviews"]);

    let products = &subgraphs[0];
    assert_eq!(products.url, "http://products");
    assert_eq!(field_names(products.schema(), "Query"), ["products"]);
    assert_eq!(
        field_names(products.schema(), "Product"),
        ["upc", "name", "price"]
    );
    assert!(!products.schema().types.contains_key("Review"));

    let reviews = &subgraphs[1];
    assert_eq!(field_names(reviews.schema(), "Product"), ["upc", "reviews"]);
    assert_eq!(field_names(reviews.schema(), "Review"), ["body", "product"]);
}

#[test]
fn extracted_subgraphs_recompose_into_the_same_supergraph() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T
            }

            type T @key(fields: "id") {
                id: ID!
                x: Int
                shared: String @shareable
            }

            interface I {
                i: Int
            }

            type U implements I {
                i: Int
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type T @key(fields: "id") {
                id: ID!
                y: Int
                shared: String @shareable
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    let subgraphs = supergraph.extract_subgraphs().expect("extracts");
    let recomposed = apollo_composition::composition::merge_subgraphs(
        subgraphs,
        &apollo_composition::link::feature_registry::FeatureRegistry::default(),
    )
    .expect("extracted subgraphs merge");
    let api_schema = |schema: &apollo_compiler::Schema| -> Vec<(String, Vec<String>)> {
        let mut types: Vec<(String, Vec<String>)> = schema
            .types
            .iter()
            .filter(|(_, type_)| !type_.is_built_in())
            .map(|(name, _)| (name.to_string(), field_names(schema, name)))
            .collect();
        types.sort();
        types
    };
    let recomposed_api = recomposed.to_api_schema().expect("recomposed API schema");
    assert_eq!(
        api_schema(&recomposed_api),
        api_schema(supergraph.api_schema())
    );
}

#[test]
fn shared_fields_are_marked_shareable_in_extracted_subgraphs() {
    let subgraph_a = ServiceDefinition {
        name: "subgraphA",
        type_defs: r#"
            type Query {
                t: T @shareable
            }

            type T {
                x: Int @shareable
            }
        "#,
    };
    let subgraph_b = ServiceDefinition {
        name: "subgraphB",
        type_defs: r#"
            type Query {
                t: T @shareable
            }

            type T {
                x: Int @shareable
            }
        "#,
    };

    let supergraph = compose_as_fed2_subgraphs(&[subgraph_a, subgraph_b]).expect("composes");
    for subgraph in supergraph.extract_subgraphs().expect("extracts") {
        let x = subgraph
            .schema()
            .type_field("T", "x")
            .expect("T.x is extracted");
        assert!(
            x.directives.iter().any(|directive| directive.name == "shareable"
                || directive.name == "federation__shareable"),
            "T.x is not shareable in {}",
            subgraph.name
        );
    }
}

fn products_subgraph() -> ServiceDefinition<'static> {
    ServiceDefinition {
        name: "products",
        type_defs: r#"
            type Query {
                products: [Product]
                product(upc: ID!): Product
            }

            type Product @key(fields: "upc") {
                upc: ID!
                name: String
                category: Category
            }

            enum Category {
                BOOK
                GAME
            }
        "#,
    }
}

#[test]
fn single_subgraph_composes_to_its_own_api() {
    let result = compose_as_fed2_subgraphs(&[products_subgraph()]);
    assert!(hints(&result).is_empty(), "{:#?}", hints(&result));
    let supergraph = result.expect("composes");
    let api_schema = supergraph.api_schema();

    let mut type_names: Vec<&str> = api_schema
        .types
        .iter()
        .filter(|(_, type_)| !type_.is_built_in())
        .map(|(name, _)| name.as_str())
        .collect();
    type_names.sort();
    assert_eq!(type_names, ["Category", "Product", "Query"]);
    assert_eq!(field_names(api_schema, "Query"), ["products", "product"]);
    assert_eq!(field_names(api_schema, "Product"), ["upc", "name", "category"]);
    let Some(ExtendedType::Enum(category)) = api_schema.types.get("Category") else {
        panic!("Category is an enum");
    };
    let values: Vec<&str> = category.values.keys().map(|value| value.as_str()).collect();
    assert_eq!(values, ["BOOK", "GAME"]);
    assert!(
        api_schema
            .directive_definitions
            .keys()
            .all(|name| !name.starts_with("join__"))
    );
}

#[test]
fn composition_is_deterministic() {
    let reviews = || ServiceDefinition {
        name: "reviews",
        type_defs: r#"
            type Review {
                body: String
                product: Product
            }

            type Product @key(fields: "upc") {
                upc: ID!
                reviews: [Review]
            }
        "#,
    };

    let first = compose_as_fed2_subgraphs(&[products_subgraph(), reviews()]).expect("composes");
    let second = compose_as_fed2_subgraphs(&[products_subgraph(), reviews()]).expect("composes");
    assert_eq!(first.schema().to_string(), second.schema().to_string());
    assert_eq!(
        first.api_schema().to_string(),
        second.api_schema().to_string()
    );
}
