use crate::operation::Operation;

/// Methods tried as unexpected when no allow-list is configured.
pub const DEFAULT_UNEXPECTED_METHODS: [&str; 7] =
    ["GET", "PUT", "POST", "DELETE", "OPTIONS", "PATCH", "TRACE"];

/// Candidate methods the operation's path does not declare, upper-cased and in
/// candidate order.
pub fn unexpected_methods(operation: &Operation, allow_list: &[String]) -> Vec<String> {
    let declared = operation.declared_methods();
    let candidates: Vec<String> = if allow_list.is_empty() {
        DEFAULT_UNEXPECTED_METHODS
            .iter()
            .map(|method| method.to_string())
            .collect()
    } else {
        allow_list.iter().map(|method| method.to_uppercase()).collect()
    };
    let mut methods: Vec<String> = Vec::with_capacity(candidates.len());
    for method in candidates {
        if !declared.contains(&method) && !methods.contains(&method) {
            methods.push(method);
        }
    }
    methods
}
