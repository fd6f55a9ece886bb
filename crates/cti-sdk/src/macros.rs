//! Call-site conveniences.

/// Build a `Vec<Value>` from anything convertible into a [`Value`].
///
/// ```
/// use cti_sdk::{Value, args};
///
/// let a = args![1, "two", 3.0];
/// assert_eq!(a[1], Value::from("two"));
/// ```
///
/// [`Value`]: crate::Value
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}

/// Call a [`Function`] with a variadic argument list.
///
/// `packed_call!(f, 1, 2)` is `f.call(&args![1, 2])`.
///
/// [`Function`]: crate::Function
#[macro_export]
macro_rules! packed_call {
    ($func:expr $(, $arg:expr)* $(,)?) => {
        $func.call(&$crate::args![$($arg),*])
    };
}
