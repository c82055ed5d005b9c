//! Small free-function vector helpers shared by the field models, the
//! stochastic synthesiser and the integrator. Positions and field samples are
//! passed around as plain `[f64; 3]` rather than a dedicated vector type, as
//! most call sites only need one or two operations.

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Unit vector along `a`, or the zero vector if `a` is (numerically) zero.
pub fn versor(a: [f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n == 0.0 {
        [0.0; 3]
    } else {
        scale(a, 1.0 / n)
    }
}

/// Line-of-sight unit vector for HEALPix colatitude `theta` and longitude
/// `phi`.
pub fn los_unit_vec(theta: f64, phi: f64) -> [f64; 3] {
    [
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    ]
}

/// Local sky-plane basis `(north, east)` at colatitude `theta`, longitude
/// `phi`: unit vectors tangent to the sphere, in the direction of increasing
/// colatitude and increasing longitude respectively, used to decompose a
/// plane-of-sky field into a position angle.
pub fn north_east_basis(theta: f64, phi: f64) -> ([f64; 3], [f64; 3]) {
    let north = [
        theta.cos() * phi.cos(),
        theta.cos() * phi.sin(),
        -theta.sin(),
    ];
    let east = [-phi.sin(), phi.cos(), 0.0];
    (north, east)
}
