//! Particle geometry generation.
//!
//! Pure shape + count -> point cloud. Each shape fills a volume by
//! sampling its parametric form; the render loop scales the cloud by the
//! smoothed expansion value. Nothing here touches the control pipeline.

use rand::Rng;
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Heart,
    Flower,
    Saturn,
    Buddha,
    Fireworks,
}

impl ShapeType {
    pub const ALL: [ShapeType; 5] = [
        ShapeType::Heart,
        ShapeType::Flower,
        ShapeType::Saturn,
        ShapeType::Buddha,
        ShapeType::Fireworks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShapeType::Heart => "Heart",
            ShapeType::Flower => "Flower",
            ShapeType::Saturn => "Saturn",
            ShapeType::Buddha => "Buddha",
            ShapeType::Fireworks => "Fireworks",
        }
    }
}

/// Generate `count` particle positions for the given shape.
pub fn generate_particles(shape: ShapeType, count: usize) -> Vec<[f32; 3]> {
    let mut rng = rand::rng();
    (0..count).map(|_| sample_point(shape, &mut rng)).collect()
}

fn sample_point(shape: ShapeType, rng: &mut impl Rng) -> [f32; 3] {
    match shape {
        ShapeType::Heart => {
            // Parametric heart, spread inside the outline:
            // x = 16 sin^3 t, y = 13 cos t - 5 cos 2t - 2 cos 3t - cos 4t
            let t = rng.random::<f32>() * 2.0 * PI;
            let scale = 0.15 * rng.random::<f32>().sqrt();
            let x = scale * 16.0 * t.sin().powi(3);
            let y = scale
                * (13.0 * t.cos()
                    - 5.0 * (2.0 * t).cos()
                    - 2.0 * (3.0 * t).cos()
                    - (4.0 * t).cos());
            let z = (rng.random::<f32>() - 0.5) * 2.0;
            [x, y, z]
        }
        ShapeType::Flower => {
            // Rhodonea curve with k = 4 petals, given volume by +1.5.
            let k = 4.0;
            let theta = rng.random::<f32>() * 2.0 * PI;
            let phi = (rng.random::<f32>() - 0.5) * PI;
            let r = (k * theta).sin() + 1.5;
            let dist = rng.random::<f32>() * 2.0;
            [
                dist * r * theta.cos() * phi.cos(),
                dist * r * theta.sin() * phi.cos(),
                dist * r * phi.sin(),
            ]
        }
        ShapeType::Saturn => {
            if rng.random::<f32>() < 0.6 {
                // Planet body: uniform sphere of radius 2.
                let r = 2.0 * rng.random::<f32>().cbrt();
                let theta = rng.random::<f32>() * 2.0 * PI;
                let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
                [
                    r * phi.sin() * theta.cos(),
                    r * phi.sin() * theta.sin(),
                    r * phi.cos(),
                ]
            } else {
                // Thin ring disk, tilted by 30 degrees.
                let angle = rng.random::<f32>() * 2.0 * PI;
                let dist = 3.0 + rng.random::<f32>() * 2.5;
                let x = dist * angle.cos();
                let z = dist * angle.sin();
                let y = (rng.random::<f32>() - 0.5) * 0.2;
                let tilt = PI / 6.0;
                [
                    x,
                    y * tilt.cos() - z * tilt.sin(),
                    y * tilt.sin() + z * tilt.cos(),
                ]
            }
        }
        ShapeType::Buddha => {
            // Abstract sitting figure: head, body, crossed legs.
            let section = rng.random::<f32>();
            if section < 0.3 {
                let r = 0.8 * rng.random::<f32>().cbrt();
                let theta = rng.random::<f32>() * 2.0 * PI;
                let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
                [
                    r * phi.sin() * theta.cos(),
                    r * phi.sin() * theta.sin() + 2.5,
                    r * phi.cos(),
                ]
            } else if section < 0.7 {
                // Conical body, narrowing with height.
                let h = rng.random::<f32>() * 2.5;
                let r = (1.0 - h / 3.0) * 1.5 * rng.random::<f32>().sqrt();
                let theta = rng.random::<f32>() * 2.0 * PI;
                [r * theta.cos(), h, r * theta.sin()]
            } else {
                // Torus segment for the crossed legs.
                let angle = rng.random::<f32>() * 2.0 * PI;
                let major = 1.8;
                let minor = 0.6 * rng.random::<f32>().sqrt();
                [
                    (major + minor * angle.cos()) * angle.cos(),
                    minor * angle.sin(),
                    (major + minor * angle.cos()) * angle.sin(),
                ]
            }
        }
        ShapeType::Fireworks => {
            // Starburst: half an even sphere, half radiating rays.
            if rng.random::<f32>() > 0.5 {
                let r = 4.0 * rng.random::<f32>().cbrt();
                let theta = rng.random::<f32>() * 2.0 * PI;
                let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
                [
                    r * phi.sin() * theta.cos(),
                    r * phi.sin() * theta.sin(),
                    r * phi.cos(),
                ]
            } else {
                let dist = rng.random::<f32>() * 5.0;
                let theta = rng.random::<f32>() * 2.0 * PI;
                let phi = rng.random::<f32>() * PI;
                [
                    dist * phi.sin() * theta.cos(),
                    dist * phi.sin() * theta.sin(),
                    dist * phi.cos(),
                ]
            }
        }
    }
}
