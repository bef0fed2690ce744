use super::rules::CaseRule;

pub(crate) fn change_case(s: &str, case: CaseRule) -> String {
    match case {
        CaseRule::Upper => s.to_uppercase(),
        CaseRule::Lower => s.to_lowercase(),
        CaseRule::Title => title_case(s),
        CaseRule::Capitalize => capitalize(s),
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_starts_every_run() {
        assert_eq!(title_case("hello wORLD, it's 9am"), "Hello World, It'S 9Am");
    }

    #[test]
    fn capitalize_lowers_the_tail() {
        assert_eq!(capitalize("hELLO World"), "Hello world");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn upper_is_idempotent() {
        let once = change_case("straße", CaseRule::Upper);
        assert_eq!(change_case(&once, CaseRule::Upper), once);
    }
}
