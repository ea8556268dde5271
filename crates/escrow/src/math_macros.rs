#[macro_export]
macro_rules! ratio {
    ($numer:expr, $denom:expr) => {{
        let numer = num_bigint::BigInt::from($numer);
        let denom = num_bigint::BigInt::from($denom);
        num_rational::BigRational::new(numer, denom)
    }};
    ($x:expr) => {{
        let x = num_bigint::BigInt::from($x);
        num_rational::BigRational::from_integer(x)
    }};
}

#[macro_export]
macro_rules! floor_int {
    ($x:expr, $ty:ty) => {
        <$ty>::try_from($x.floor().to_integer()).map_err(|_| veboost_core::Error::Overflow)
    };
}
