// ABOUTME: This module provides macros to reduce boilerplate in option setters and command methods
// ABOUTME: Includes macros for builder-pattern fluent setters and no-special-shape command methods

/// Macro for generating builder setter methods
///
/// This macro generates fluent setter methods for builder patterns,
/// where each method takes a value, sets the corresponding field,
/// and returns self for method chaining.
///
/// # Arguments
/// * `$($field:ident: $type:ty),*` - Field name and type pairs
///
/// # Generated code
/// For each field, generates:
/// ```rust
/// pub fn $field(mut self, $field: $type) -> Self {
///     self.$field = $field;
///     self
/// }
/// ```
macro_rules! builder_setters {
    ($($field:ident: $type:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

/// Macro for generating a `RedisCommands` method that takes a fixed list of
/// positional arguments and passes them through to `send_command` unchanged.
/// Covers the common case — commands with no special argument shape (no
/// key/value splitting, no variadic TLV-style encoding) — so those methods
/// don't each repeat the same argument-vector construction.
///
/// # Arguments
/// * `$name` - the method name (also used as the command's wire name)
/// * `$($arg:ident),*` - the method's parameters, each converted via `Into<Arg>`
///
/// # Generated code
/// ```rust
/// async fn $name(&mut self, $($arg: impl Into<Arg>),*) -> RedisResult<Value> {
///     self.send_command(vec![Arg::from(stringify!($name)), $($arg.into()),*]).await
/// }
/// ```
macro_rules! redis_command {
    ($name:ident $(, $arg:ident)*) => {
        async fn $name(&mut self, $($arg: impl Into<$crate::command::Arg>),*) -> $crate::error::RedisResult<$crate::value::Value> {
            #[allow(unused_mut)]
            let mut args = vec![$crate::command::Arg::from(stringify!($name))];
            $(args.push($arg.into());)*
            self.send_command(args).await
        }
    };
}

pub(crate) use {builder_setters, redis_command};
