//! Transform card representation and the rigid-body transform algebra (§4.4)

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

use super::round_tr;

/// A coordinate-transform card (`tr` / `*tr`), or the Deck's accumulated
/// `object_transform`.
///
/// Stored as read: if `degrees` is set the rotation entries are angles in
/// degrees rather than direction cosines, and `sense = -1` means the card
/// expresses the inverse (child-to-parent) mapping. Use [`Transform::to_rigid`]
/// to obtain the normalised, scalar-unit, forward-sense form every
/// computation actually operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Transform card number; `0` for a card-less accumulator such as
    /// [`crate::Deck::object_transform`]
    pub id: u32,
    /// `true` for `*tr` (degrees), `false` for `tr` (direction cosines)
    pub degrees: bool,
    /// Translation vector, centimetres
    pub translation: Vector3<f64>,
    /// 3x3 rotation matrix, row-major, in the card's native unit
    pub rotation: Matrix3<f64>,
    /// `+1` forward, `-1` inverse (child-to-parent)
    pub sense: i8,
}

impl Transform {
    /// The identity transform: zero translation, identity rotation,
    /// forward sense.
    pub fn identity() -> Self {
        Transform {
            id: 0,
            degrees: false,
            translation: Vector3::zeros(),
            rotation: Matrix3::identity(),
            sense: 1,
        }
    }

    /// Converts to scalar (direction-cosine) units and normalises a reverse
    /// sense, per §4.4: degrees entries become `cos(m * pi / 180)`, and a
    /// `sense = -1` card is replaced by `T := -R^T . T`, `sense := 1`.
    pub fn to_rigid(&self) -> RigidTransform {
        let rotation = if self.degrees {
            self.rotation.map(|m| (m * PI / 180.0).cos())
        } else {
            self.rotation
        };
        let (translation, sense) = if self.sense == -1 {
            (-rotation.transpose() * self.translation, 1)
        } else {
            (self.translation, self.sense)
        };
        RigidTransform {
            translation,
            rotation,
        }
    }
}

/// A normalised rigid-body transform: scalar rotation, forward sense.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Translation vector, centimetres
    pub translation: Vector3<f64>,
    /// 3x3 rotation matrix, row-major, direction cosines
    pub rotation: Matrix3<f64>,
}

impl RigidTransform {
    /// The identity transform.
    pub fn identity() -> Self {
        RigidTransform {
            translation: Vector3::zeros(),
            rotation: Matrix3::identity(),
        }
    }

    /// Object-level composition (§4.4): given the existing transform `self`
    /// and an applied input `other`, returns the new accumulated transform.
    ///
    /// `R' = R0 . Ri`, `T' = Ri^T . T0 + Ti`
    pub fn compose_object(&self, applied: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation * applied.rotation,
            translation: applied.rotation.transpose() * self.translation + applied.translation,
        }
    }

    /// Per-card sandwich composition (§4.4) used to fold a new rigid-body
    /// transform into an existing in-cell constant `trcl=`/`fill=` value.
    ///
    /// `R_new = Ri^T . R_cell . Ri`
    /// `T_new = -R_new^T . Ti + Ti + Ri^T . T_cell`
    pub fn compose_cell_constant(&self, applied: &RigidTransform) -> RigidTransform {
        let rotation =
            applied.rotation.transpose() * self.rotation * applied.rotation;
        let translation = -rotation.transpose() * applied.translation
            + applied.translation
            + applied.rotation.transpose() * self.translation;
        RigidTransform {
            rotation,
            translation,
        }
    }

    /// Rounds every component to [`super::ROUND_TR`] decimal places.
    pub fn rounded(&self) -> RigidTransform {
        RigidTransform {
            translation: self.translation.map(round_tr),
            rotation: self.rotation.map(round_tr),
        }
    }
}

/// Pure translation constructor: `(T, I, +1)`.
pub fn translation(t: Vector3<f64>) -> RigidTransform {
    RigidTransform {
        translation: t,
        rotation: Matrix3::identity(),
    }
}

/// Axis-cardinal rotation about X by `angle` (radians if `!degrees`).
///
/// Each output row is formed by dotting one new-basis vector against all
/// three old-basis vectors (§4.4); this is not the transpose of the naive
/// construction.
pub fn rotation_x(angle: f64, degrees: bool) -> Matrix3<f64> {
    let a = if degrees { angle.to_radians() } else { angle };
    let xp = Vector3::new(1.0, 0.0, 0.0);
    let yp = Vector3::new(0.0, a.cos(), a.sin());
    let zp = Vector3::new(0.0, (PI / 2.0 + a).cos(), (PI / 2.0 + a).sin());
    basis_matrix(xp, yp, zp)
}

/// Axis-cardinal rotation about Y by `angle`.
///
/// The source negates the angle for this axis before building the basis
/// vectors; this convention is preserved exactly (§4.4).
pub fn rotation_y(angle: f64, degrees: bool) -> Matrix3<f64> {
    let a = -(if degrees { angle.to_radians() } else { angle });
    let xp = Vector3::new(a.cos(), 0.0, a.sin());
    let yp = Vector3::new(0.0, 1.0, 0.0);
    let zp = Vector3::new((PI / 2.0 + a).cos(), 0.0, (PI / 2.0 + a).sin());
    basis_matrix(xp, yp, zp)
}

/// Axis-cardinal rotation about Z by `angle`.
pub fn rotation_z(angle: f64, degrees: bool) -> Matrix3<f64> {
    let a = if degrees { angle.to_radians() } else { angle };
    let xp = Vector3::new(a.cos(), a.sin(), 0.0);
    let yp = Vector3::new((PI / 2.0 + a).cos(), (PI / 2.0 + a).sin(), 0.0);
    let zp = Vector3::new(0.0, 0.0, 1.0);
    basis_matrix(xp, yp, zp)
}

/// Builds the row-major 3x3 matrix whose rows are `X.Xp Y.Xp Z.Xp | X.Yp
/// Y.Yp Z.Yp | X.Zp Y.Zp Z.Zp`, i.e. each new basis vector dotted against
/// the three old basis vectors.
fn basis_matrix(xp: Vector3<f64>, yp: Vector3<f64>, zp: Vector3<f64>) -> Matrix3<f64> {
    let x = Vector3::new(1.0, 0.0, 0.0);
    let y = Vector3::new(0.0, 1.0, 0.0);
    let z = Vector3::new(0.0, 0.0, 1.0);
    Matrix3::new(
        x.dot(&xp), y.dot(&xp), z.dot(&xp),
        x.dot(&yp), y.dot(&yp), z.dot(&yp),
        x.dot(&zp), y.dot(&zp), z.dot(&zp),
    )
}

/// Euler ZXZ rotation matrix constructor: `R = Rz(a) . Rx(b) . Rz(g)`.
pub fn euler_zxz(a: f64, b: f64, g: f64, degrees: bool) -> Matrix3<f64> {
    let (a, b, g) = if degrees {
        (a.to_radians(), b.to_radians(), g.to_radians())
    } else {
        (a, b, g)
    };
    let (ca, sa) = (a.cos(), a.sin());
    let (cb, sb) = (b.cos(), b.sin());
    let (cg, sg) = (g.cos(), g.sin());
    Matrix3::new(
        ca * cg - sa * cb * sg, sa * cg + ca * cb * sg, sb * sg,
        -ca * sg - sa * cb * cg, -sa * sg + ca * cb * cg, sb * cg,
        sa * sb, -ca * sb, cb,
    )
}

/// Recovers `(alpha, beta, gamma)` Euler ZXZ angles (radians) from a
/// rotation matrix, handling the degenerate `sin(beta) == 0` case (§4.4).
pub fn angles_euler_zxz(r: &Matrix3<f64>) -> (f64, f64, f64) {
    let beta = r[(2, 2)].clamp(-1.0, 1.0).acos();
    if beta.sin().abs() > 1e-12 {
        let alpha = r[(0, 2)].atan2(-r[(1, 2)]);
        let gamma = r[(2, 0)].atan2(r[(2, 1)]);
        (alpha, beta, gamma)
    } else {
        let alpha = -(-r[(0, 1)]).atan2(r[(0, 0)]);
        (alpha, beta, 0.0)
    }
}

/// Rodrigues axis-angle rotation matrix about unit vector `u` by `angle`.
///
/// The source negates the angle "to avoid transposing the matrix"; this is
/// preserved exactly (§4.4).
pub fn rotation_axis_angle(u: Vector3<f64>, angle: f64, degrees: bool) -> Matrix3<f64> {
    let a = -(if degrees { angle.to_radians() } else { angle });
    let u = u.normalize();
    let (c, s) = (a.cos(), a.sin());
    let (ux, uy, uz) = (u.x, u.y, u.z);
    Matrix3::new(
        c + ux * ux * (1.0 - c), ux * uy * (1.0 - c) - uz * s, ux * uz * (1.0 - c) + uy * s,
        uy * ux * (1.0 - c) + uz * s, c + uy * uy * (1.0 - c), uy * uz * (1.0 - c) - ux * s,
        uz * ux * (1.0 - c) - uy * s, uz * uy * (1.0 - c) + ux * s, c + uz * uz * (1.0 - c),
    )
}
