//! Hydrogen orbital probability densities, the scalar fields this crate was built to show.
//!
//! Distances are in Bohr radii. Densities are sampled with [`CoordinateSystem::Spherical`],
//! so a field receives `(r, azimuth, polar)`.

use std::{f64::consts::PI, sync::Arc};

use tracing::warn;

use crate::{
    error::{Result, VolumeError},
    lattice::VolumeSpec,
    resolution::Resolution,
    transform::LatticeTransform,
    types::{CoordinateSystem, Point, ScalarField, Value},
};

/// Principal (`n`), angular (`l`) and magnetic (`m`) quantum numbers.
///
/// Only [`QuantumNumbers::new`] constructs one, so `n ≥ 1`, `l < n` and `|m| ≤ l` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantumNumbers {
    n: u32,
    l: u32,
    m: i32,
}

impl Default for QuantumNumbers {
    fn default() -> Self {
        Self { n: 1, l: 0, m: 0 }
    }
}

impl QuantumNumbers {
    /// Checks `n ≥ 1`, `l < n` and `|m| ≤ l`.
    pub fn new(n: u32, l: u32, m: i32) -> Result<Self> {
        let reason = if n == 0 {
            Some("n must be at least 1")
        } else if l >= n {
            Some("l must be less than n")
        } else if m.unsigned_abs() > l {
            Some("|m| must not be greater than l")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!(n, l, m, reason, "rejected quantum numbers");
                Err(VolumeError::InvalidQuantumNumbers { n, l, m, reason })
            }
            None => Ok(Self { n, l, m }),
        }
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn l(&self) -> u32 {
        self.l
    }

    pub fn m(&self) -> i32 {
        self.m
    }

    /// Rendering defaults tuned per orbital. Only `n ≤ 3` has presets.
    pub fn preset(&self) -> Option<OrbitalPreset> {
        let (intensity, radius) = match (self.n, self.l, self.m.unsigned_abs()) {
            (1, 0, 0) => (12.0, 2.0),
            (2, 0, 0) | (2, 1, 0) => (400.0, 8.0),
            (2, 1, 1) => (700.0, 8.0),
            (3, 0, 0) | (3, 1, 0) | (3, 2, 0) => (5000.0, 20.0),
            (3, 1, 1) => (3000.0, 20.0),
            (3, 2, 1) => (50000.0, 20.0),
            (3, 2, 2) => (7000.0, 20.0),
            _ => return None,
        };
        Some(OrbitalPreset { intensity, radius })
    }
}

/// Default shading intensity and sampling radius (in Bohr radii) for one orbital.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalPreset {
    pub intensity: Value,
    pub radius: Value,
}

/// User-facing orbital selection: what gets sampled and how bright it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalSettings {
    pub quantum: QuantumNumbers,
    pub intensity: Value,
    pub radius: Value,
}

impl Default for OrbitalSettings {
    fn default() -> Self {
        Self {
            quantum: QuantumNumbers::default(),
            intensity: 12.0,
            radius: 2.0,
        }
    }
}

impl OrbitalSettings {
    /// Selects an orbital and resets intensity and radius to its preset.
    pub fn select(n: u32, l: u32, m: i32) -> Result<Self> {
        let quantum = QuantumNumbers::new(n, l, m)?;
        let preset = quantum.preset().ok_or(VolumeError::InvalidQuantumNumbers {
            n,
            l,
            m,
            reason: "no preset for this orbital",
        })?;
        Ok(Self {
            quantum,
            intensity: preset.intensity,
            radius: preset.radius,
        })
    }

    /// Whether moving from `previous` to `self` changes the sampled data. Intensity is
    /// applied at shading time and never needs a rebuild.
    pub fn needs_rebuild(&self, previous: &OrbitalSettings) -> bool {
        self.quantum != previous.quantum || self.radius != previous.radius
    }

    pub fn orbital(&self) -> Orbital {
        Orbital {
            quantum: self.quantum,
            radius: self.radius,
        }
    }
}

/// A hydrogen orbital sampled over a cube of half-width `radius` Bohr radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbital {
    pub quantum: QuantumNumbers,
    pub radius: Value,
}

impl Orbital {
    /// `|R_nl(r) · Y_lm|²` at spherical coordinates `(r, azimuth, polar)`.
    ///
    /// `Y_lm` is the real (chemistry) harmonic, so `m ≠ 0` orbitals show lobes rather
    /// than rings.
    pub fn density(&self, spherical: Point) -> Value {
        let QuantumNumbers { n, l, m } = self.quantum;
        let (r, azimuth, polar) = (spherical.x, spherical.y, spherical.z);

        if r == 0.0 {
            // Only s orbitals are non-zero at the nucleus, where the angles are undefined.
            let radial = radial_wavefunction(0.0, n, l);
            return if l == 0 { radial * radial / (4.0 * PI) } else { 0.0 };
        }

        let psi = radial_wavefunction(r, n, l) * real_spherical_harmonic(polar, azimuth, l, m);
        psi * psi
    }

    /// Spherical sampling over `[-radius, radius]^3`.
    pub fn volume_spec(&self, resolution: Resolution) -> Result<VolumeSpec> {
        Ok(VolumeSpec::new(resolution)
            .with_coordinates(CoordinateSystem::Spherical)
            .with_transform(LatticeTransform::uniform_scale(2.0 * self.radius)?))
    }

    /// This orbital as a shareable [`ScalarField`].
    pub fn field(self) -> Arc<ScalarField> {
        Arc::new(move |p: Point| self.density(p))
    }
}

fn factorial(n: u32) -> Value {
    (1..=n).map(Value::from).product()
}

/// Generalised Laguerre polynomial `L_k^α(x)`.
pub fn laguerre(x: Value, k: u32, alpha: u32) -> Value {
    let alpha = alpha as Value;
    let mut previous = 1.0;
    if k == 0 {
        return previous;
    }
    let mut current = 1.0 + alpha - x;
    for i in 1..k {
        let i = i as Value;
        let next = ((2.0 * i + 1.0 + alpha - x) * current - (i + alpha) * previous) / (i + 1.0);
        previous = current;
        current = next;
    }
    current
}

/// Associated Legendre function `P_l^m(x)` with the Condon-Shortley phase, `m ≤ l`.
pub fn associated_legendre(x: Value, l: u32, m: u32) -> Value {
    if m > l {
        return 0.0;
    }

    // P_m^m = (-1)^m (2m - 1)!! (1 - x²)^(m/2)
    let mut pmm = 1.0;
    let somx2 = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
    let mut odd = 1.0;
    for _ in 0..m {
        pmm *= -odd * somx2;
        odd += 2.0;
    }
    if l == m {
        return pmm;
    }

    let mut pmmp1 = x * (2 * m + 1) as Value * pmm;
    for ll in (m + 2)..=l {
        let pll = (x * (2 * ll - 1) as Value * pmmp1 - (ll + m - 1) as Value * pmm)
            / (ll - m) as Value;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pmmp1
}

/// Radial part `R_nl(r)` of the hydrogen wavefunction, `r` in Bohr radii. Zero unless `l < n`.
pub fn radial_wavefunction(r: Value, n: u32, l: u32) -> Value {
    let Some(degree) = n.checked_sub(l + 1) else {
        return 0.0;
    };
    let nf = n as Value;
    let rho = 2.0 * r / nf;
    let norm = ((2.0 / nf).powi(3) * factorial(degree) / (2.0 * nf * factorial(n + l))).sqrt();
    norm * (-rho / 2.0).exp() * rho.powi(l as i32) * laguerre(rho, degree, 2 * l + 1)
}

/// Real spherical harmonic: `cos(mφ)` lobes for `m > 0`, `sin(|m|φ)` for `m < 0`.
/// Zero when `|m| > l`.
pub fn real_spherical_harmonic(polar: Value, azimuth: Value, l: u32, m: i32) -> Value {
    let m_abs = m.unsigned_abs();
    let Some(spread) = l.checked_sub(m_abs) else {
        return 0.0;
    };
    let norm = ((2 * l + 1) as Value / (4.0 * PI) * factorial(spread) / factorial(l + m_abs)).sqrt();
    let legendre = associated_legendre(polar.cos(), l, m_abs);

    match m {
        0 => norm * legendre,
        m if m > 0 => 2.0_f64.sqrt() * norm * legendre * (m_abs as Value * azimuth).cos(),
        _ => 2.0_f64.sqrt() * norm * legendre * (m_abs as Value * azimuth).sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;

    #[test]
    fn quantum_numbers_are_validated() {
        assert!(QuantumNumbers::new(2, 1, -1).is_ok());
        assert!(matches!(
            QuantumNumbers::new(2, 2, 0),
            Err(VolumeError::InvalidQuantumNumbers { reason: "l must be less than n", .. })
        ));
        assert!(matches!(
            QuantumNumbers::new(3, 1, 2),
            Err(VolumeError::InvalidQuantumNumbers { reason: "|m| must not be greater than l", .. })
        ));
        assert!(QuantumNumbers::new(0, 0, 0).is_err());
    }

    #[test]
    fn quantum_numbers_expose_validated_values() {
        let quantum = QuantumNumbers::new(3, 2, -2).unwrap();
        assert_eq!((quantum.n(), quantum.l(), quantum.m()), (3, 2, -2));
    }

    #[test]
    fn out_of_range_numbers_give_zero_instead_of_underflowing() {
        // l ≥ n and |m| > l would underflow the factorial arguments.
        assert_eq!(radial_wavefunction(1.0, 1, 1), 0.0);
        assert_eq!(radial_wavefunction(0.5, 2, 4), 0.0);
        assert_eq!(real_spherical_harmonic(0.4, 1.0, 1, 2), 0.0);
        assert_eq!(real_spherical_harmonic(0.4, 1.0, 0, -1), 0.0);
    }

    #[test]
    fn presets_follow_magnitude_of_m() {
        let settings = OrbitalSettings::select(3, 2, -1).unwrap();
        assert_eq!(settings.intensity, 50000.0);
        assert_eq!(settings.radius, 20.0);
        assert_eq!(OrbitalSettings::select(1, 0, 0).unwrap(), OrbitalSettings::default());
        assert!(OrbitalSettings::select(4, 0, 0).is_err());
    }

    #[test]
    fn intensity_changes_do_not_rebuild() {
        let before = OrbitalSettings::select(2, 1, 1).unwrap();
        let brighter = OrbitalSettings {
            intensity: 1000.0,
            ..before
        };
        let wider = OrbitalSettings {
            radius: 10.0,
            ..before
        };
        assert!(!brighter.needs_rebuild(&before));
        assert!(wider.needs_rebuild(&before));
        assert!(OrbitalSettings::select(2, 1, 0).unwrap().needs_rebuild(&before));
    }

    #[test]
    fn ground_state_density() {
        let orbital = OrbitalSettings::default().orbital();
        assert!((orbital.density(Point::new(0.0, 0.0, 0.0)) - 1.0 / PI).abs() < 1e-12);
        let at_one = orbital.density(Point::new(1.0, 0.3, 1.1));
        assert!((at_one - (-2.0_f64).exp() / PI).abs() < 1e-12);
    }

    #[test]
    fn radial_functions_are_normalised() {
        for (n, l) in [(1, 0), (2, 0), (2, 1), (3, 1), (3, 2)] {
            let dr = 1e-3;
            let total: Value = (0..80_000)
                .map(|i| {
                    let r = (i as Value + 0.5) * dr;
                    let radial = radial_wavefunction(r, n, l);
                    radial * radial * r * r * dr
                })
                .sum();
            assert!((total - 1.0).abs() < 1e-6, "n={n} l={l}: {total}");
        }
    }

    #[test]
    fn real_harmonics_are_normalised() {
        let steps = 400;
        let d_polar = PI / steps as Value;
        let d_azimuth = 2.0 * PI / steps as Value;
        for (l, m) in [(0, 0), (1, -1), (1, 1), (2, 0), (2, 2), (2, -1)] {
            let mut total = 0.0;
            for i in 0..steps {
                let polar = (i as Value + 0.5) * d_polar;
                for j in 0..steps {
                    let azimuth = (j as Value + 0.5) * d_azimuth;
                    let y = real_spherical_harmonic(polar, azimuth, l, m);
                    total += y * y * polar.sin() * d_polar * d_azimuth;
                }
            }
            assert!((total - 1.0).abs() < 1e-3, "l={l} m={m}: {total}");
        }
    }

    #[test]
    fn p_orbital_lobes_follow_the_azimuth() {
        let orbital = OrbitalSettings::select(2, 1, 1).unwrap().orbital();
        // m = 1 points along x (azimuth 0), not along y.
        let along_x = orbital.density(Point::new(2.0, 0.0, PI / 2.0));
        let along_y = orbital.density(Point::new(2.0, PI / 2.0, PI / 2.0));
        assert!(along_x > 1e-4);
        assert!(along_y < 1e-12);
    }

    #[test]
    fn sampled_orbital_fits_in_fixed_point_range() {
        let orbital = OrbitalSettings::select(2, 1, 0).unwrap().orbital();
        let spec = orbital.volume_spec(Resolution::R16).unwrap();
        let field = orbital.field();
        let lattice = Lattice::sample(&spec, field.as_ref());
        assert!(lattice.indexed_iter().all(|(_, v)| (0.0..=1.0).contains(&v)));
        assert!(lattice.indexed_iter().any(|(_, v)| v > 0.0));
    }
}
