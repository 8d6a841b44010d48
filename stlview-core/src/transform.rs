/// 3D transformation matrices
use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Create a translation matrix
    pub fn translation_matrix(offset: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_translation(offset)
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }

    /// Matrix that carries model-space normals into world space
    pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
        let linear = model.fixed_view::<3, 3>(0, 0).into_owned();
        linear
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix3::identity)
    }

    /// Transform a point to homogeneous clip coordinates (no perspective divide)
    pub fn to_clip(mvp: &Matrix4<f32>, point: &Point3<f32>) -> Vector4<f32> {
        mvp * point.to_homogeneous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_moves_points() {
        let matrix = Transform::translation_matrix(&Vector3::new(1.0, -2.0, 3.0));
        let moved = matrix.transform_point(&Point3::origin());
        assert_relative_eq!(moved, Point3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_translation_keeps_normals() {
        let matrix = Transform::translation_matrix(&Vector3::new(4.0, 5.0, 6.0));
        let normal = Transform::normal_matrix(&matrix) * Vector3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(normal, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_identity_mvp() {
        let identity = Matrix4::identity();
        let mvp = Transform::mvp_matrix(&identity, &identity, &identity);
        assert!((mvp - Matrix4::identity()).norm() < 1e-6);
    }
}
