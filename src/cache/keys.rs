use crate::core::EntityId;
use crate::storage::Predicate;

/// Object cache key for one entity row.
pub fn object_key(kind: &str, id: EntityId) -> String {
    format!("{}:data:{}", kind.to_lowercase(), id)
}

/// Search cache key for one `(where, order)` combination.
pub fn search_key(kind: &str, predicate: &Predicate, order: Option<&str>) -> String {
    format!(
        "{}:search:[{}]:[{}]",
        kind.to_lowercase(),
        predicate.canonical(),
        order.map(str::trim).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(object_key("Ticket", 7), "ticket:data:7");
        assert_eq!(
            search_key("Ticket", &Predicate::from("a = 1"), Some(" id DESC ")),
            "ticket:search:[raw:a = 1]:[id DESC]"
        );
        assert_ne!(
            search_key("ticket", &Predicate::eq("a", 1), None),
            search_key("ticket", &Predicate::eq("a", 1), Some("id"))
        );
    }
}
