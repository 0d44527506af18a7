/// Replace characters Graphite treats as path separators or that break
/// tag parsing with `_`.
///
/// # Examples
///
/// ```
/// use cloudsec_common::metric_name::escape_metric_name;
///
/// assert_eq!(escape_metric_name("(test)of/metric"), "_test_of_metric");
/// assert_eq!(escape_metric_name("compliance.CIS v1.2"), "compliance_CIS_v1_2");
/// ```
pub fn escape_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '.' | '{' | '}' | '(' | ')' | '/' => '_',
            other => other,
        })
        .collect()
}
