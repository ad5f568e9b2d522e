/// Expand `${NAME}` and `${NAME:-fallback}` placeholders from the process
/// environment.
///
/// The fallback applies when the variable is unset or empty. An unset
/// variable without a fallback keeps its placeholder text, so a later lookup
/// can still detect it.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // unterminated
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match lookup(name).filter(|v| !v.is_empty() || fallback.is_none()) {
            Some(value) if !name.is_empty() => out.push_str(&value),
            _ => match fallback {
                Some(fallback) if !name.is_empty() => out.push_str(fallback),
                _ => out.push_str(&rest[start..start + 2 + end + 1]),
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
