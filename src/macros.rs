/// Builds a [`Value`](crate::Value) from a literal.
///
/// Lists use `[...]`, dictionaries `{ "path": value, ... }`; anything else goes
/// through `Value::from`.
///
/// ```rust
/// use dictfile::{value, Value};
///
/// let v = value!({ "scan/rate": 10, "tags": ["a", "b"], "offset": None });
/// let dict = v.as_dict().unwrap();
/// assert_eq!(dict.get("scan/rate"), Some(&Value::from(10)));
/// assert_eq!(dict.get("offset"), Some(&Value::Null));
/// ```
#[macro_export]
macro_rules! value {
    (None) => {
        $crate::Value::Null
    };

    ([]) => {
        $crate::Value::List(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::List(vec![$($crate::value!($elem)),*])
    };

    ({}) => {
        $crate::Value::Dict($crate::Dictionary::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $crate::value!($value));
        )*
        $crate::Value::Dict(dict)
    }};

    ($other:expr) => {
        $crate::Value::from($other)
    };
}

/// Builds a [`Dictionary`](crate::Dictionary) from `path => value` pairs.
///
/// Paths are split on `/`, so nested branches are created as needed.
///
/// ```rust
/// use dictfile::{dict, Value};
///
/// let d = dict! {
///     "a" => 1,
///     "b/c" => "text",
/// };
/// assert_eq!(d.get("b/c"), Some(&Value::from("text")));
/// assert_eq!(d.len(), 2);
/// ```
#[macro_export]
macro_rules! dict {
    () => {
        $crate::Dictionary::new()
    };

    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $crate::Value::from($value));
        )+
        dict
    }};
}
