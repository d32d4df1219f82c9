#[cfg(feature = "std")]
pub(crate) fn panicking() -> bool {
    std::thread::panicking()
}

#[cfg(not(feature = "std"))]
#[allow(dead_code)]
pub(crate) fn panicking() -> bool {
    false
}
