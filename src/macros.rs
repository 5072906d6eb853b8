/// Compile a parameterized [`Statement`](crate::Statement).
///
/// Every `{}` in the template becomes the next `$n` placeholder and the matching value is
/// bound, never spliced into the text. Write `{{` / `}}` for literal braces. The number of
/// slots is checked against the number of values at compile time.
/// ```rust
/// use sql_guard::prelude::*;
///
/// let stmt = sql!("SELECT * FROM bars WHERE n = ANY ({}) AND label = {}", vec![1, 3], "x");
/// assert_eq!(stmt.text(), "SELECT * FROM bars WHERE n = ANY ($1) AND label = $2");
/// assert_eq!(stmt.values().len(), 2);
/// ```
#[macro_export]
macro_rules! sql {
    ($template:literal $(, $value:expr)* $(,)?) => {{
        const _: () = ::core::assert!(
            $crate::statement::template::slot_count($template)
                == <[()]>::len(&[$($crate::__sql_unit!($value)),*]),
            "slot count of sql! template does not match the number of values"
        );
        $crate::Statement::from_checked_template(
            $crate::StatementKind::Parameterized,
            $template,
            ::std::vec![$($crate::RowValues::from($value)),*],
        )
    }};
}

/// Compile a raw fragment: every value is inlined into the text as its literal form.
///
/// Values are not quoted or escaped. Use only for SQL that cannot be parameterized
/// (identifiers, sort direction, DDL) with trusted input.
/// ```rust
/// use sql_guard::prelude::*;
///
/// let order = raw!("ORDER BY {} {}", "created_at", "desc");
/// assert_eq!(order.text(), "ORDER BY created_at desc");
/// assert!(order.values().is_empty());
/// ```
#[macro_export]
macro_rules! raw {
    ($template:literal $(, $value:expr)* $(,)?) => {{
        const _: () = ::core::assert!(
            $crate::statement::template::slot_count($template)
                == <[()]>::len(&[$($crate::__sql_unit!($value)),*]),
            "slot count of raw! template does not match the number of values"
        );
        $crate::Statement::from_checked_template(
            $crate::StatementKind::Raw,
            $template,
            ::std::vec![$($crate::RowValues::from($value)),*],
        )
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __sql_unit {
    ($_value:expr) => {
        ()
    };
}
