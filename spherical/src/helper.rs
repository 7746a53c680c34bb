/// n! as a float; 0! = 1 and negative arguments give 1 as well.
pub fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

/// (-1)^n
#[inline]
pub fn parity_sign(n: i32) -> f64 {
    if n.rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Number of components of an order-λ spherical tensor.
#[inline]
pub fn n_components(lambda: i32) -> usize {
    (2 * lambda + 1) as usize
}
