/// Unwrap a [`Poll`](std::task::Poll) value, returning the value from
/// the [`Ready`](std::task::Poll::Ready) variant, or propagating the
/// [`Pending`](std::task::Poll::Pending) variant to the caller.
macro_rules! ready {
    ($e:expr) => {
        match $e {
            std::task::Poll::Pending => {
                return std::task::Poll::Pending;
            }
            std::task::Poll::Ready(value) => value,
        }
    };
}
