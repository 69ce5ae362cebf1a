/// Return the flag word `x` with bit `bit` set if `toggle` is true, cleared otherwise.
pub fn set_bit(bit: u16, x: u16, toggle: bool) -> u16 {
    if toggle {
        x | (1 << bit)
    } else {
        x & !(1 << bit)
    }
}

/// Test whether bit `bit` of the flag word `x` is set.
pub fn test_bit(bit: u16, x: u16) -> bool {
    (x >> bit) & 1 == 1
}
