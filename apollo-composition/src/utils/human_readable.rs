pub(crate) struct JoinStringsOptions<'a> {
    pub(crate) separator: &'a str,
    pub(crate) first_separator: Option<&'a str>,
    pub(crate) last_separator: Option<&'a str>,
    /// When displaying a list of something in a human-readable form, after what size (in number
    /// of characters) we start displaying only a subset of the list. Note this only counts
    /// characters in list elements, and ignores separators.
    pub(crate) output_length_limit: usize,
}

impl Default for JoinStringsOptions<'_> {
    fn default() -> Self {
        Self {
            separator: ", ",
            first_separator: None,
            last_separator: Some(" and "),
            output_length_limit: 100,
        }
    }
}

/// Joins an iterator by the given separators. If the list of elements is too long, it is
/// truncated with `...` and `true` is returned alongside the output.
pub(crate) fn join_strings(
    mut iter: impl Iterator<Item = impl AsRef<str>>,
    options: JoinStringsOptions,
) -> (String, bool) {
    let mut output = String::new();
    let Some(first) = iter.next() else {
        return (output, false);
    };
    output.push_str(first.as_ref());
    let Some(second) = iter.next() else {
        return (output, false);
    };
    // With exactly two elements, the first separator wins over the last one.
    let mut element_length = first.as_ref().chars().count();
    let mut push_element = |output: &mut String, separator: &str, element: &str| {
        element_length += element.chars().count();
        if element_length > options.output_length_limit {
            output.push_str(", ...");
            return false;
        }
        output.push_str(separator);
        output.push_str(element);
        true
    };
    let last_separator = options.last_separator.unwrap_or(options.separator);
    let Some(mut current) = iter.next() else {
        let separator = options.first_separator.unwrap_or(last_separator);
        let truncated = !push_element(&mut output, separator, second.as_ref());
        return (output, truncated);
    };
    let first_separator = options.first_separator.unwrap_or(options.separator);
    if !push_element(&mut output, first_separator, second.as_ref()) {
        return (output, true);
    }
    for next in iter {
        if !push_element(&mut output, options.separator, current.as_ref()) {
            return (output, true);
        }
        current = next;
    }
    let truncated = !push_element(&mut output, last_separator, current.as_ref());
    (output, truncated)
}

pub(crate) struct HumanReadableListOptions<'a> {
    pub(crate) prefix: Option<HumanReadableListPrefix<'a>>,
    pub(crate) last_separator: &'a str,
    /// When displaying a list of something in a human-readable form, after what size (in number
    /// of characters) we start displaying only a subset of the list.
    pub(crate) output_length_limit: usize,
    /// The output when the list is empty.
    pub(crate) empty_output: &'a str,
}

pub(crate) struct HumanReadableListPrefix<'a> {
    pub(crate) singular: &'a str,
    pub(crate) plural: &'a str,
}

impl Default for HumanReadableListOptions<'_> {
    fn default() -> Self {
        Self {
            prefix: None,
            last_separator: " and ",
            output_length_limit: 100,
            empty_output: "",
        }
    }
}

/// Like [join_strings], but adds a prefix and handles an empty list.
pub(crate) fn human_readable_list(
    mut iter: impl Iterator<Item = impl AsRef<str>>,
    options: HumanReadableListOptions,
) -> String {
    let Some(first) = iter.next() else {
        return options.empty_output.to_string();
    };
    let Some(second) = iter.next() else {
        return match options.prefix {
            Some(prefix) => format!("{} {}", prefix.singular, first.as_ref()),
            None => first.as_ref().to_string(),
        };
    };
    let joined = join_strings(
        std::iter::once(first)
            .chain(std::iter::once(second))
            .chain(iter),
        JoinStringsOptions {
            last_separator: Some(options.last_separator),
            output_length_limit: options.output_length_limit,
            ..Default::default()
        },
    )
    .0;
    match options.prefix {
        Some(prefix) => format!("{} {}", prefix.plural, joined),
        None => joined,
    }
}

pub(crate) fn human_readable_subgraph_names(
    subgraph_names: impl Iterator<Item = impl AsRef<str>>,
) -> String {
    human_readable_list(
        subgraph_names.map(|name| format!("\"{}\"", name.as_ref())),
        HumanReadableListOptions {
            prefix: Some(HumanReadableListPrefix {
                singular: "subgraph",
                plural: "subgraphs",
            }),
            ..Default::default()
        },
    )
}

pub(crate) fn human_readable_types(types: impl Iterator<Item = impl AsRef<str>>) -> String {
    human_readable_list(
        types.map(|t| format!("\"{}\"", t.as_ref())),
        HumanReadableListOptions {
            prefix: Some(HumanReadableListPrefix {
                singular: "type",
                plural: "types",
            }),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_strings_uses_separators() {
        let options = || JoinStringsOptions {
            separator: " and ",
            first_separator: Some(" but "),
            last_separator: Some(" and "),
            output_length_limit: usize::MAX,
        };
        assert_eq!(join_strings(["a"].iter(), options()).0, "a");
        assert_eq!(join_strings(["a", "b"].iter(), options()).0, "a but b");
        assert_eq!(
            join_strings(["a", "b", "c", "d"].iter(), options()).0,
            "a but b and c and d"
        );
        assert_eq!(
            join_strings(["a", "b", "c"].iter(), JoinStringsOptions::default()).0,
            "a, b and c"
        );
    }

    #[test]
    fn human_readable_subgraph_names_prefixes() {
        assert_eq!(human_readable_subgraph_names(["A"].iter()), "subgraph \"A\"");
        assert_eq!(
            human_readable_subgraph_names(["A", "B", "C"].iter()),
            "subgraphs \"A\", \"B\" and \"C\""
        );
        assert_eq!(human_readable_subgraph_names(Vec::<String>::new().iter()), "");
    }

    #[test]
    fn long_lists_are_truncated() {
        let names: Vec<String> = (0..30).map(|i| format!("subgraph_number_{i}")).collect();
        let printed = human_readable_subgraph_names(names.iter());
        assert!(printed.starts_with("subgraphs \"subgraph_number_0\", "));
        assert!(printed.ends_with(", ..."));
    }
}
