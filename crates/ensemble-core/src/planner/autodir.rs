//! Run directory names derived from parameter values, e.g.
//! `{alpha: 0.5, beta_max: 2}` becomes `alph.0.5.btmx.2`.

use crate::table::Assignment;

/// Directory name for one assignment; empty when there are no parameters.
pub fn autoname(params: &Assignment) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}.{}", short_name(name), clean_value(&value.to_string())))
        .collect::<Vec<_>>()
        .join(".")
}

/// First character, then the rest without vowels or underscores.
fn short_name(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    std::iter::once(first)
        .chain(chars.filter(|c| !"aeiouAEIOU_".contains(*c)))
        .collect()
}

fn clean_value(value: &str) -> String {
    value
        .replace(".nc", "")
        .replace("..", "")
        .replace(['+', '/'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(pairs: &[(&str, f64)]) -> Assignment {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn names_compact_parameter_names() {
        assert_eq!(short_name("alpha"), "alph");
        assert_eq!(short_name("beta_max"), "btmx");
        assert_eq!(short_name("a"), "a");
        assert_eq!(short_name("Ice"), "Ic");
    }

    #[test]
    fn values_drop_path_noise() {
        assert_eq!(clean_value("1e+20"), "1e20");
        assert_eq!(clean_value("data/run.nc"), "datarun");
        assert_eq!(clean_value("a..b"), "ab");
    }

    #[test]
    fn autoname_joins_tokens() {
        let a = assignment(&[("alpha", 0.5), ("beta_max", 2.0)]);
        assert_eq!(autoname(&a), "alph.0.5.btmx.2");
        assert_eq!(autoname(&Assignment::new()), "");
    }

    #[test]
    fn distinct_values_give_distinct_names() {
        let names: std::collections::HashSet<String> = [(2.0, 0.0), (2.0, 1.0), (3.0, 0.0), (3.0, 1.0)]
            .iter()
            .map(|&(a, b)| autoname(&assignment(&[("a", a), ("b", b)])))
            .collect();
        assert_eq!(names.len(), 4);
    }
}
