use itertools::Itertools;

const MAX_SUGGESTIONS: usize = 5;

/// Given an invalid input string and a list of valid options, returns a filtered list of valid
/// options sorted by their similarity with the input.
pub(crate) fn suggestion_list(
    input: &str,
    options: impl IntoIterator<Item = impl AsRef<str>>,
) -> Vec<String> {
    let threshold = 1 + input.chars().count() * 2 / 5;
    let input_lowercase = input.to_lowercase();
    options
        .into_iter()
        .filter_map(|option| {
            let option = option.as_ref();
            let distance = lexical_distance(input, &input_lowercase, option, threshold)?;
            Some((distance, option.to_string()))
        })
        .sorted()
        .map(|(_, option)| option)
        .collect()
}

/// Computes the optimal string alignment distance between the input and an option, treating a
/// case-only difference as a distance of 1. Returns `None` when above the threshold.
fn lexical_distance(
    input: &str,
    input_lowercase: &str,
    option: &str,
    threshold: usize,
) -> Option<usize> {
    if input == option {
        return Some(0);
    }
    let option_lowercase = option.to_lowercase();
    if *input_lowercase == option_lowercase {
        return Some(1);
    }
    let a: Vec<char> = input_lowercase.chars().collect();
    let b: Vec<char> = option_lowercase.chars().collect();
    if a.len().abs_diff(b.len()) > threshold {
        return None;
    }

    let mut rows = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in rows.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in rows[0].iter_mut().enumerate() {
        *cell = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut current = (rows[i - 1][j] + 1)
                .min(rows[i][j - 1] + 1)
                .min(rows[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                current = current.min(rows[i - 2][j - 2] + 1);
            }
            rows[i][j] = current;
        }
    }
    let distance = rows[a.len()][b.len()];
    (distance <= threshold).then_some(distance)
}

/// Formats suggestions as a sentence, e.g. ` Did you mean "a" or "b"?`, or returns an empty
/// string without suggestions.
pub(crate) fn did_you_mean(suggestions: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let quoted: Vec<String> = suggestions
        .into_iter()
        .map(|s| format!("\"{}\"", s.as_ref()))
        .collect();
    let message = " Did you mean ";
    match quoted.as_slice() {
        [] => String::new(),
        [only] => format!("{message}{only}?"),
        [first, second] => format!("{message}{first} or {second}?"),
        _ => {
            let selected = &quoted[..quoted.len().min(MAX_SUGGESTIONS)];
            let (last, rest) = match selected.split_last() {
                Some(split) => split,
                None => return String::new(),
            };
            format!("{message}{}, or {last}?", rest.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_names() {
        assert_eq!(
            suggestion_list("Subgraph3", ["Subgraph1", "Subgraph2", "Other"]),
            vec!["Subgraph1".to_string(), "Subgraph2".to_string()]
        );
        assert_eq!(suggestion_list("foo", ["FOO", "bar"]), vec!["FOO".to_string()]);
        assert!(suggestion_list("abc", ["xyzuvw"]).is_empty());
    }

    #[test]
    fn did_you_mean_sentences() {
        assert_eq!(did_you_mean(Vec::<String>::new()), "");
        assert_eq!(did_you_mean(["a"]), " Did you mean \"a\"?");
        assert_eq!(did_you_mean(["a", "b"]), " Did you mean \"a\" or \"b\"?");
        assert_eq!(
            did_you_mean(["a", "b", "c"]),
            " Did you mean \"a\", \"b\", or \"c\"?"
        );
    }
}
