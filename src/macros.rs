pub use enclose::*;

/// Builds a [`Computed`](crate::Computed) from an expression.
///
/// The body is wrapped in `Ok`, so `?` propagates suspended or failed
/// reads. Names in the leading parentheses are cloned into the closure.
///
/// ```
/// use reactive_atom::{derived, Var};
///
/// let a = Var::new(1);
/// let double = derived!((a) cx => cx.get(&a)? * 2);
/// assert_eq!(double.get().ready(), Some(2));
/// ```
#[macro_export]
macro_rules! derived {
    (( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $crate::Computed::new($crate::macros::enclose!(($( $d_tt )*) move |$cx: &$crate::Tracker| { ::std::result::Result::Ok({ $($b)* }) }))
    };
    ($cx:ident => $($b:tt)*) => {
        $crate::Computed::new(move |$cx: &$crate::Tracker| { ::std::result::Result::Ok({ $($b)* }) })
    };
}
