//! A small, self-contained stand-in for a HEALPix-equivalent spherical
//! pixelisation, NESTED ordering, providing exactly the operations the
//! integrator's shell compositing needs: `pix2ang`, `ang2pix`, and a
//! bilinear-style `interpolate`. This is not a general-purpose HEALPix
//! port -- it reimplements the well known NESTED base-pixel/bit-interleave
//! scheme, but approximates on-sphere bilinear interpolation with an
//! inverse-angular-distance blend over a handful of neighbouring pixel
//! centres rather than the four-ring exact weights of a full HEALPix
//! library.

use crate::errors::*;
use crate::vecmath::{dot, los_unit_vec};

const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

#[derive(Debug, Clone, Copy)]
pub struct Map {
    pub nside: usize,
}

impl Map {
    pub fn new(nside: usize) -> Result<Map> {
        if nside == 0 || !nside.is_power_of_two() {
            bail!(ErrorKind::Configuration(format!(
                "nside must be a positive power of two, got {}",
                nside
            )));
        }
        Ok(Map { nside })
    }

    pub fn npix(&self) -> usize {
        12 * self.nside * self.nside
    }

    /// `(theta, phi)` colatitude/longitude of the centre of pixel `ipix`.
    pub fn pix2ang(&self, ipix: usize) -> (f64, f64) {
        let npface = self.nside * self.nside;
        let face_num = ipix / npface;
        let ipf = (ipix % npface) as u64;
        let (ix, iy) = deinterleave_bits(ipf);
        let (z, phi) = xyf2loc(ix, iy, face_num, self.nside);
        (z.clamp(-1.0, 1.0).acos(), phi)
    }

    /// NESTED pixel index containing direction `(theta, phi)`.
    pub fn ang2pix(&self, theta: f64, phi: f64) -> usize {
        let nside = self.nside as f64;
        let z = theta.cos();
        let za = z.abs();
        let mut tt = phi / std::f64::consts::FRAC_PI_2;
        tt %= 4.0;
        if tt < 0.0 {
            tt += 4.0;
        }

        let (face_num, ix, iy) = if za <= 2.0 / 3.0 {
            let temp1 = nside * (0.5 + tt);
            let temp2 = nside * z * 0.75;
            let jp = (temp1 - temp2).floor() as i64;
            let jm = (temp1 + temp2).floor() as i64;
            let ns = self.nside as i64;
            let ifp = jp.div_euclid(ns);
            let ifm = jm.div_euclid(ns);
            let face_num = if ifp == ifm {
                (ifp | 4) as usize
            } else if ifp < ifm {
                ifp as usize
            } else {
                (ifm + 8) as usize
            };
            let ix = jm.rem_euclid(ns) as u32;
            let iy = (ns - 1 - jp.rem_euclid(ns)) as u32;
            (face_num, ix, iy)
        } else {
            let ntt = tt.floor().min(3.0);
            let tp = tt - ntt;
            let tmp = nside * (3.0 * (1.0 - za)).sqrt();
            let ns = self.nside as i64;
            let jp = ((tp * tmp).floor() as i64).min(ns - 1);
            let jm = (((1.0 - tp) * tmp).floor() as i64).min(ns - 1);
            if z >= 0.0 {
                let face_num = ntt as usize;
                let ix = (ns - 1 - jm) as u32;
                let iy = (ns - 1 - jp) as u32;
                (face_num, ix, iy)
            } else {
                let face_num = ntt as usize + 8;
                let ix = jp as u32;
                let iy = jm as u32;
                (face_num, ix, iy)
            }
        };

        let ipf = interleave_bits(ix, iy);
        face_num * self.nside * self.nside + ipf as usize
    }

    /// Approximate bilinear interpolation of `values` (one entry per pixel
    /// of this map, NESTED order) at direction `(theta, phi)`.
    pub fn interpolate(&self, direction: (f64, f64), values: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), self.npix());
        let (theta, phi) = direction;
        let center_pix = self.ang2pix(theta, phi);
        let pixel_size = (std::f64::consts::PI / (3.0 * (self.nside * self.nside) as f64)).sqrt();

        let dirvec = los_unit_vec(theta, phi);
        let mut candidates = vec![center_pix];
        let offsets = [
            (pixel_size, 0.0),
            (-pixel_size, 0.0),
            (0.0, pixel_size),
            (0.0, -pixel_size),
        ];
        for (dtheta, dphi) in offsets {
            let t = (theta + dtheta).clamp(1e-9, std::f64::consts::PI - 1e-9);
            let p = phi + dphi;
            let cand = self.ang2pix(t, p);
            if !candidates.contains(&cand) {
                candidates.push(cand);
            }
        }

        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for &pix in &candidates {
            let (pt, pp) = self.pix2ang(pix);
            let pv = los_unit_vec(pt, pp);
            let cos_d = dot(dirvec, pv).clamp(-1.0, 1.0);
            let ang_dist = cos_d.acos();
            if ang_dist < 1e-12 {
                return values[pix];
            }
            let w = 1.0 / ang_dist;
            weight_sum += w;
            value_sum += w * values[pix];
        }
        if weight_sum == 0.0 {
            values[center_pix]
        } else {
            value_sum / weight_sum
        }
    }
}

fn xyf2loc(ix: u32, iy: u32, face: usize, nside: usize) -> (f64, f64) {
    let ns = nside as i64;
    let jr = JRLL[face] * ns - ix as i64 - iy as i64 - 1;

    let (nr, z, kshift) = if jr < ns {
        let nr = jr;
        (nr, 1.0 - (nr * nr) as f64 / (3.0 * (ns * ns) as f64), 0i64)
    } else if jr > 3 * ns {
        let nr = 4 * ns - jr;
        (nr, (nr * nr) as f64 / (3.0 * (ns * ns) as f64) - 1.0, 0i64)
    } else {
        let nr = ns;
        let z = (2 * ns - jr) as f64 * (2.0 / (3.0 * ns as f64));
        (nr, z, (jr - ns) & 1)
    };

    let mut jp = (JPLL[face] * nr + ix as i64 - iy as i64 + 1 + kshift) / 2;
    if jp > 4 * nr {
        jp -= 4 * nr;
    }
    if jp < 1 {
        jp += 4 * nr;
    }

    let phi = (jp as f64 - (kshift as f64 + 1.0) * 0.5) * std::f64::consts::FRAC_PI_2 / nr as f64;
    (z, phi)
}

fn spread_bits(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

fn compact_bits(v: u64) -> u32 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

fn interleave_bits(ix: u32, iy: u32) -> u64 {
    spread_bits(ix) | (spread_bits(iy) << 1)
}

fn deinterleave_bits(p: u64) -> (u32, u32) {
    (compact_bits(p), compact_bits(p >> 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npix_formula() {
        let m = Map::new(4).unwrap();
        assert_eq!(m.npix(), 12 * 16);
    }

    #[test]
    fn rejects_non_power_of_two_nside() {
        assert!(Map::new(3).is_err());
        assert!(Map::new(0).is_err());
    }

    #[test]
    fn pix2ang_covers_full_sphere_range() {
        let m = Map::new(8).unwrap();
        for ipix in 0..m.npix() {
            let (theta, phi) = m.pix2ang(ipix);
            assert!((0.0..=std::f64::consts::PI).contains(&theta));
            assert!((0.0..std::f64::consts::TAU + 1e-9).contains(&phi));
        }
    }

    #[test]
    fn every_pixel_maps_back_to_itself() {
        let m = Map::new(8).unwrap();
        for ipix in 0..m.npix() {
            let (theta, phi) = m.pix2ang(ipix);
            assert_eq!(m.ang2pix(theta, phi), ipix);
        }
    }

    #[test]
    fn interpolate_exact_at_pixel_center() {
        let m = Map::new(8).unwrap();
        let mut values = vec![0.0; m.npix()];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64;
        }
        for ipix in [0usize, 10, 100, 500] {
            let (theta, phi) = m.pix2ang(ipix);
            let got = m.interpolate((theta, phi), &values);
            assert!((got - values[ipix]).abs() < 1e-6);
        }
    }

    #[test]
    fn interpolate_constant_field_is_constant() {
        let m = Map::new(8).unwrap();
        let values = vec![3.5; m.npix()];
        let got = m.interpolate((1.0, 0.7), &values);
        assert!((got - 3.5).abs() < 1e-9);
    }
}
