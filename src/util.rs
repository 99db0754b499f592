macro_rules! assert_or {
    ($cond:expr, $err:expr $(,)?) => {
        if $cond {
            Ok(())
        } else {
            Err($err)
        }
    };
}

pub(crate) use assert_or;
