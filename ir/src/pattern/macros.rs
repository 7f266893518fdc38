/// Build a [`Pat`](crate::pattern::Pat) from operator-call syntax.
///
/// - `Kind(args...)` is an operator pattern with exact operands
/// - a bare identifier is a variable leaf
/// - `{ expr }` splices an already built `Pat` (for constraints)
///
/// ```ignore
/// let bn = pat!(BatchNormGrad(dy, x, scale, mean, var));
/// let root = pat!(Cast({ bn.output_var(index) }));
/// ```
#[macro_export]
macro_rules! pat {
    (@args [$($done:expr,)*]) => {
        [$($done),*]
    };
    (@args [$($done:expr,)*] { $e:expr } $(, $($rest:tt)*)?) => {
        $crate::pat!(@args [$($done,)* $e,] $($($rest)*)?)
    };
    (@args [$($done:expr,)*] $kind:ident ( $($inner:tt)* ) $(, $($rest:tt)*)?) => {
        $crate::pat!(@args [$($done,)* $crate::pat!($kind($($inner)*)),] $($($rest)*)?)
    };
    (@args [$($done:expr,)*] $var:ident $(, $($rest:tt)*)?) => {
        $crate::pat!(@args [$($done,)* $crate::pattern::Pat::var($var),] $($($rest)*)?)
    };

    ({ $e:expr }) => {
        $e
    };
    ($kind:ident ( $($args:tt)* )) => {
        $crate::pattern::Pat::op($crate::OpKind::$kind, $crate::pat!(@args [] $($args)*))
    };
    ($var:ident) => {
        $crate::pattern::Pat::var($var)
    };
}
