/// Turn a pipeline name into a filesystem-safe slug: lowercase ASCII
/// alphanumerics with runs of anything else collapsed to a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen && !slug.is_empty() {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "pipeline".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_spaces_and_punctuation() {
        assert_eq!(slugify("My Pipeline!"), "my-pipeline");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(slugify("a   b---c"), "a-b-c");
    }

    #[test]
    fn falls_back_for_empty_input() {
        assert_eq!(slugify("!!!"), "pipeline");
    }
}
