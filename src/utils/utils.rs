//! Helper functions: rotations, spatial transforms and generalized inverses

use nalgebra::{DMatrix, Matrix3, Matrix6, Rotation3, SymmetricEigen, Vector3};
use nalgebra::linalg::SVD;
use tracing::warn;

use crate::control_error::{check_shape, ControlError};
use crate::control_traits::{Jacobian, JointVector, Pose, Twist, TASK_DIM};

/// Default tolerance below which singular values are treated as zero.
pub const PINV_TOLERANCE: f64 = 1e-4;

/// Skew symmetric matrix of the vector, so that `skew(v) * x == v.cross(x)`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Block diagonal [R 0; 0 R], rotates a twist or a wrench without moving its reference point.
pub fn spatial_rotation(rotation: &Matrix3<f64>) -> Matrix6<f64> {
    let mut r = Matrix6::zeros();
    r.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    r.fixed_view_mut::<3, 3>(3, 3).copy_from(rotation);
    r
}

/// Spatial adjoint of the pose for twists stacked as [linear; angular]:
/// ```text
/// | R   skew(p) R |
/// | 0   R         |
/// ```
/// Maps a twist (or Jacobian columns) given in the frame described by `pose` into the
/// frame `pose` is expressed in.
pub fn spatial_adjoint(pose: &Pose) -> Matrix6<f64> {
    let mut ad = spatial_rotation(&pose.rotation);
    ad.fixed_view_mut::<3, 3>(0, 3)
        .copy_from(&(skew(&pose.position) * pose.rotation));
    ad
}

/// Transforms the twist with the spatial adjoint of the pose.
pub fn adjoint_twist(pose: &Pose, twist: &Twist) -> Twist {
    Twist::from_vector(&(spatial_adjoint(pose) * twist.to_vector()))
}

/// Transforms all columns of the 6xN Jacobian with the spatial adjoint of the pose.
pub fn adjoint_jacobian(pose: &Pose, jacobian: &Jacobian) -> Result<Jacobian, ControlError> {
    check_shape("jacobian", jacobian.shape(), (TASK_DIM, jacobian.ncols()))?;
    let ad = spatial_adjoint(pose);
    let ad = DMatrix::from_column_slice(TASK_DIM, TASK_DIM, ad.as_slice());
    Ok(ad * jacobian)
}

/// Generalized inverse from the singular value decomposition.
///
/// Singular values not above `tolerance` are set to zero in the inverse instead of being
/// inverted, so rank deficient directions (kinematic singularities) are dropped rather
/// than amplified. The result has the transposed dimensions of `matrix`.
///
/// The decomposition is checked by recomposing `U Σ Vᵗ`. If it does not reproduce the
/// matrix (seen for some wide rank deficient matrices), the inverse is computed from the
/// eigen decomposition of the Gram matrix instead, see [gram_pseudo_inverse].
pub fn pseudo_inverse(matrix: &DMatrix<f64>, tolerance: f64) -> Result<DMatrix<f64>, ControlError> {
    if !matrix.iter().all(|x| x.is_finite()) {
        return Err(ControlError::NotFinite("matrix to invert"));
    }
    if !(tolerance >= 0.0) {
        return Err(ControlError::Numerical(
            format!("pseudo inverse tolerance must be non negative, got {}", tolerance)));
    }
    let svd = SVD::new(matrix.clone(), true, true);
    let residual = match (&svd.u, &svd.v_t) {
        (Some(u), Some(v_t)) => {
            let recomposed = u * DMatrix::from_diagonal(&svd.singular_values) * v_t;
            (recomposed - matrix).amax()
        }
        _ => f64::INFINITY,
    };
    if residual <= SVD_RESIDUAL * (1.0 + matrix.amax()) {
        return svd.pseudo_inverse(tolerance)
            .map_err(|msg| ControlError::Numerical(msg.to_string()));
    }
    warn!("SVD does not reproduce the {}x{} matrix (residual {:e}), using the Gram matrix",
          matrix.nrows(), matrix.ncols(), residual);
    Ok(gram_pseudo_inverse(matrix, tolerance))
}

/// Largest acceptable element of `U Σ Vᵗ - A`, relative to the largest element of A.
const SVD_RESIDUAL: f64 = 1e-9;

/// Pseudo inverse through the symmetric eigen decomposition of the smaller Gram matrix:
/// `Aᵗ (A Aᵗ)⁺` for wide and `(Aᵗ A)⁺ Aᵗ` for tall matrices. Eigenvalues of the Gram
/// matrix are squared singular values, so they are truncated at `tolerance²`.
pub fn gram_pseudo_inverse(matrix: &DMatrix<f64>, tolerance: f64) -> DMatrix<f64> {
    let wide = matrix.nrows() <= matrix.ncols();
    let gram = if wide {
        matrix * matrix.transpose()
    } else {
        matrix.transpose() * matrix
    };
    let eigen = SymmetricEigen::new(gram);
    let threshold = tolerance * tolerance;
    let size = eigen.eigenvalues.len();
    let mut gram_inverse = DMatrix::<f64>::zeros(size, size);
    for (i, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda > threshold {
            let v = eigen.eigenvectors.column(i);
            gram_inverse += (v * v.transpose()) / lambda;
        }
    }
    if wide {
        matrix.transpose() * gram_inverse
    } else {
        gram_inverse * matrix.transpose()
    }
}

/// [pseudo_inverse] of a 3x3 matrix.
pub fn pseudo_inverse3(matrix: &Matrix3<f64>, tolerance: f64) -> Result<Matrix3<f64>, ControlError> {
    let inverse = pseudo_inverse(&DMatrix::from_column_slice(3, 3, matrix.as_slice()), tolerance)?;
    Ok(Matrix3::from_column_slice(inverse.as_slice()))
}

/// Weighted right pseudo inverse `W⁻¹ Jᵗ (J W⁻¹ Jᵗ)⁻¹`. With the inertia matrix as `W`
/// this is the dynamically consistent inverse. Fails if `W` or `J W⁻¹ Jᵗ` is singular.
pub fn weighted_pseudo_inverse(
    weight: &DMatrix<f64>,
    matrix: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ControlError> {
    let n = matrix.ncols();
    check_shape("weight", weight.shape(), (n, n))?;
    let weight_inverse = weight.clone().try_inverse()
        .ok_or_else(|| ControlError::Numerical("weight matrix is singular".to_string()))?;
    let projected = matrix * &weight_inverse * matrix.transpose();
    let projected_inverse = projected.try_inverse()
        .ok_or_else(|| ControlError::Numerical("weighted Gram matrix is singular".to_string()))?;
    Ok(weight_inverse * matrix.transpose() * projected_inverse)
}

/// Nearest orthonormal matrix, `R (RᵗR)^(-1/2)` computed through the eigen decomposition
/// of RᵗR. Leaves an orthonormal matrix unchanged.
pub fn orthonormalize(rotation: &Matrix3<f64>) -> Matrix3<f64> {
    let eigen = SymmetricEigen::new(rotation.transpose() * rotation);
    if eigen.eigenvalues.iter().any(|&d| !(d > f64::EPSILON)) {
        warn!("Rotation matrix is rank deficient, eigenvalues {:?}", eigen.eigenvalues.as_slice());
        return Rotation3::from_matrix(rotation).into_inner();
    }
    let mut inverse_sqrt = Matrix3::zeros();
    for (i, d) in eigen.eigenvalues.iter().enumerate() {
        let v = eigen.eigenvectors.column(i);
        inverse_sqrt += (v * v.transpose()) / d.sqrt();
    }
    rotation * inverse_sqrt
}

/// Pose from [x, y, z, rx, ry, rz], rotation composed as Rx(rx) Ry(ry) Rz(rz).
pub fn pose_from_xyz_rpy(v: &[f64; 6]) -> Pose {
    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), v[3])
        * Rotation3::from_axis_angle(&Vector3::y_axis(), v[4])
        * Rotation3::from_axis_angle(&Vector3::z_axis(), v[5]);
    Pose::new(Vector3::new(v[0], v[1], v[2]), rotation.into_inner())
}

/// Checks if all elements are finite
pub fn is_valid(values: &[f64]) -> bool {
    values.iter().all(|x| x.is_finite())
}

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians(degrees: &[f64]) -> JointVector {
    JointVector::from_iterator(degrees.len(), degrees.iter().map(|d| d.to_radians()))
}

/// Print joint values, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_joints(joints: &JointVector) {
    let row_str: Vec<String> = joints.iter()
        .map(|q| format!("{:5.2}", q.to_degrees()))
        .collect();
    println!("[{}]", row_str.join(" "));
}

/// Print torques (or any other joint space vector) as they are.
#[allow(dead_code)]
pub fn dump_torques(torques: &JointVector) {
    let row_str: Vec<String> = torques.iter()
        .map(|t| format!("{:8.3}", t))
        .collect();
    println!("[{}]", row_str.join(" "));
}

/// formatting for YAML output
pub(crate) fn deg(x: &f64) -> String {
    if *x == 0.0 {
        return "0".to_string();
    }
    format!("deg({:.4})", x.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};
    use nalgebra::{Isometry3, Vector6};

    fn assert_matrix_approx_eq(left: &DMatrix<f64>, right: &DMatrix<f64>, epsilon: f64) {
        assert_eq!(left.shape(), right.shape());
        for i in 0..left.nrows() {
            for j in 0..left.ncols() {
                assert!((left[(i, j)] - right[(i, j)]).abs() < epsilon,
                        "left[{0},{1}] = {2} is not approximately equal to right[{0},{1}] = {3}",
                        i, j, left[(i, j)], right[(i, j)]);
            }
        }
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid(&[0.0, 1.0, -1.0, PI]));
        assert!(!is_valid(&[0.0, f64::NAN, 1.0]));
        assert!(!is_valid(&[f64::INFINITY, 1.0]));
    }

    #[test]
    fn test_skew_is_cross_product() {
        let v = Vector3::new(0.3, -1.2, 2.5);
        let x = Vector3::new(-0.7, 0.4, 1.1);
        assert!((skew(&v) * x - v.cross(&x)).norm() < 1e-14);
        assert_eq!(skew(&v).transpose(), -skew(&v));
    }

    #[test]
    fn test_adjoint_moves_twist() {
        // Frame shifted by 1 along x, rotated 90 degrees about z.
        let pose = Pose::from(Isometry3::new(Vector3::new(1.0, 0.0, 0.0),
                                             Vector3::new(0.0, 0.0, FRAC_PI_2)));
        // Pure rotation about the local z axis.
        let twist = Twist::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let moved = adjoint_twist(&pose, &twist);
        // Rotating about an axis through (1, 0, 0) moves the base origin with velocity -y.
        assert!((moved.angular - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((moved.linear - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_adjoint_jacobian_matches_twist() {
        let pose = pose_from_xyz_rpy(&[0.2, -0.1, 0.5, 0.3, -0.2, 0.9]);
        let jacobian = Jacobian::from_fn(6, 3, |i, j| (i as f64 + 1.0) * 0.1 - j as f64 * 0.3);
        let transformed = adjoint_jacobian(&pose, &jacobian).unwrap();
        for j in 0..3 {
            let column = Vector6::from_iterator(jacobian.column(j).iter().cloned());
            let expected = adjoint_twist(&pose, &Twist::from_vector(&column)).to_vector();
            for i in 0..6 {
                assert!((transformed[(i, j)] - expected[i]).abs() < 1e-12);
            }
        }
        assert!(adjoint_jacobian(&pose, &DMatrix::zeros(5, 3)).is_err());
    }

    #[test]
    fn test_pseudo_inverse_penrose_conditions() {
        let m = DMatrix::from_row_slice(3, 4, &[
            1.0, 2.0, 0.0, -1.0,
            0.5, -1.0, 3.0, 0.0,
            2.0, 0.0, 1.0, 1.0,
        ]);
        let pinv = pseudo_inverse(&m, PINV_TOLERANCE).unwrap();
        assert_eq!(pinv.shape(), (4, 3));
        assert_matrix_approx_eq(&(&m * &pinv * &m), &m, 1e-9);
        assert_matrix_approx_eq(&(&pinv * &m * &pinv), &pinv, 1e-9);
    }

    #[test]
    fn test_pseudo_inverse_truncates_small_singular_values() {
        // Singular values 2 and 1e-6, the second is below tolerance.
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1e-6]);
        let pinv = pseudo_inverse(&m, PINV_TOLERANCE).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.0, 0.0]);
        assert_matrix_approx_eq(&pinv, &expected, 1e-12);

        // Rank deficient: Penrose conditions still hold on the retained subspace
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        let pinv = pseudo_inverse(&m, PINV_TOLERANCE).unwrap();
        assert_matrix_approx_eq(&(&m * &pinv * &m), &m, 1e-9);
        assert!(pinv.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_gram_pseudo_inverse_matches_svd() {
        let wide = DMatrix::from_row_slice(3, 4, &[
            1.0, 2.0, 0.0, -1.0,
            0.5, -1.0, 3.0, 0.0,
            2.0, 0.0, 1.0, 1.0,
        ]);
        for m in [wide.clone(), wide.transpose()] {
            let svd = SVD::new(m.clone(), true, true).pseudo_inverse(PINV_TOLERANCE).unwrap();
            assert_matrix_approx_eq(&gram_pseudo_inverse(&m, PINV_TOLERANCE), &svd, 1e-9);
        }
    }

    #[test]
    fn test_pseudo_inverse_of_rank_two_jacobian() {
        // cos(a + b) = cos a cos b - sin a sin b, rank 2
        let m = DMatrix::from_fn(6, 7, |i, k| ((i + 2 * k) as f64 * 0.71).cos());
        let pinv = pseudo_inverse(&m, PINV_TOLERANCE).unwrap();
        assert_matrix_approx_eq(&(&m * &pinv * &m), &m, 1e-9);
        assert_matrix_approx_eq(&(&pinv * &m * &pinv), &pinv, 1e-9);
        // Both products are symmetric projectors
        let left = &m * &pinv;
        assert_matrix_approx_eq(&left.transpose(), &left, 1e-9);
        let right = &pinv * &m;
        assert_matrix_approx_eq(&right.transpose(), &right, 1e-9);
        assert!((right.trace() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pseudo_inverse_rejects_nan() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, 0.0, 1.0]);
        assert!(matches!(pseudo_inverse(&m, PINV_TOLERANCE), Err(ControlError::NotFinite(_))));
    }

    #[test]
    fn test_weighted_pseudo_inverse() {
        let j = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        let w = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 2.0, 4.0]));
        let inverse = weighted_pseudo_inverse(&w, &j).unwrap();
        assert_matrix_approx_eq(&(&j * &inverse), &DMatrix::identity(2, 2), 1e-12);

        // Identity weight gives the ordinary pseudo inverse of a full rank matrix
        let plain = weighted_pseudo_inverse(&DMatrix::identity(3, 3), &j).unwrap();
        assert_matrix_approx_eq(&plain, &pseudo_inverse(&j, PINV_TOLERANCE).unwrap(), 1e-12);

        assert!(weighted_pseudo_inverse(&DMatrix::zeros(3, 3), &j).is_err());
    }

    #[test]
    fn test_orthonormalize() {
        let rotation = pose_from_xyz_rpy(&[0.0, 0.0, 0.0, 0.4, -1.1, 2.0]).rotation;
        // Idempotent on a rotation
        assert!((orthonormalize(&rotation) - rotation).norm() < 1e-12);

        // Removes drift
        let drifted = rotation + Matrix3::new(
            1e-3, -2e-3, 0.0,
            0.0, 1e-3, 5e-4,
            -1e-3, 0.0, 2e-3);
        let fixed = orthonormalize(&drifted);
        assert!((fixed.transpose() * fixed - Matrix3::identity()).norm() < 1e-12);
        assert!((fixed.determinant() - 1.0).abs() < 1e-12);
        assert!((fixed - rotation).norm() < 1e-2);
    }

    #[test]
    fn test_pose_from_xyz_rpy() {
        let pose = pose_from_xyz_rpy(&[1.0, 2.0, 3.0, 0.0, 0.0, FRAC_PI_2]);
        assert_eq!(pose.position, Vector3::new(1.0, 2.0, 3.0));
        assert!((pose.rotation * Vector3::x() - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_as_radians_and_deg() {
        let q = as_radians(&[90.0, -180.0]);
        assert!((q[0] - FRAC_PI_2).abs() < 1e-15);
        assert!((q[1] + PI).abs() < 1e-15);
        assert_eq!(deg(&0.0), "0");
        assert_eq!(deg(&FRAC_PI_2), "deg(90.0000)");
    }
}
