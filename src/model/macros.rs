/// Declares a typed model over [`Entity`](crate::Entity).
///
/// Each field gets a getter returning `Result<Option<T>>` and a `set_` setter.
/// Relations become part of the generated [`ModelDef`](crate::ModelDef).
///
/// ```
/// fezmodel::model! {
///     pub struct Ticket {
///         kind: "ticket",
///         table: "tickets",
///         primary_key: "id",
///         fields: { title: String, status: String, priority: i64 },
///         relations: {
///             owner => one("owner_id", "user"),
///             comments => many("ticket_id", "comment"),
///         },
///     }
/// }
///
/// use fezmodel::Model;
/// assert_eq!(Ticket::definition().table(), "tickets");
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            kind: $kind:literal,
            table: $table:literal,
            primary_key: $pk:literal,
            fields: { $( $field:ident : $field_ty:ty ),* $(,)? },
            relations: { $( $rel:ident => $card:ident ( $local:literal, $foreign:literal ) ),* $(,)? } $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name($crate::Entity);

        impl $crate::Model for $name {
            const KIND: &'static str = $kind;

            fn definition() -> $crate::ModelDef {
                $crate::ModelDef::new($kind, $table, $pk)
                    $( .relation(stringify!($rel), $crate::Relation::$card($local, $foreign)) )*
            }

            fn from_entity(entity: $crate::Entity) -> Self {
                Self(entity)
            }

            fn entity(&self) -> &$crate::Entity {
                &self.0
            }
        }

        $crate::paste::paste! {
            impl $name {
                $(
                    pub fn $field(&self) -> $crate::Result<Option<$field_ty>> {
                        self.0.get_as::<$field_ty>(stringify!($field))
                    }

                    pub fn [<set_ $field>](&self, value: $field_ty) -> $crate::Result<()> {
                        self.0.set(stringify!($field), value)
                    }
                )*
            }
        }
    };
}
