//! End-to-end renders of a small mock scene.
//!
//! A white diffuse floor square at y = 0 is lit by a downward-facing square
//! emitter at y = 1 and seen by an orthographic camera looking straight down.

use std::f32::consts::PI;

use photonmap::path::{MaterialId, SurfacePoint};
use photonmap::render::{BsdfSample, Camera, EmitterSample, FrameBuffer, Hit, RenderLoop, RenderState, Scene};
use photonmap::util::{sample_cosine_hemisphere, Ray, Rgb, UVec2, Vec2, Vec3};
use photonmap::{Error, RenderSettings};

const FLOOR: MaterialId = MaterialId(0);
const LIGHT: MaterialId = MaterialId(1);
const FLOOR_HALF: f32 = 1.0;
const LIGHT_HALF: f32 = 0.25;
const LIGHT_HEIGHT: f32 = 1.0;
const ALBEDO: f32 = 0.8;
const BACKGROUND: Rgb = Rgb::new(0.1, 0.2, 0.3);

struct Room;

impl Room {
    fn hit_plane(ray: &Ray, height: f32, half: f32, normal: Vec3, material: MaterialId) -> Option<Hit> {
        if ray.direction.y == 0.0 {
            return None;
        }
        let t = (height - ray.origin.y) / ray.direction.y;
        if t <= ray.min_distance {
            return None;
        }
        let p = ray.at(t);
        if p.x.abs() > half || p.z.abs() > half {
            return None;
        }
        Some(Hit {
            point: SurfacePoint::new(p, normal, material),
            distance: t,
        })
    }
}

impl Scene for Room {
    fn trace(&self, ray: &Ray) -> Option<Hit> {
        let floor = Self::hit_plane(ray, 0.0, FLOOR_HALF, Vec3::Y, FLOOR);
        // The emitter is one-sided and only visible from below
        let light = if ray.direction.y > 0.0 {
            Self::hit_plane(ray, LIGHT_HEIGHT, LIGHT_HALF, -Vec3::Y, LIGHT)
        } else {
            None
        };
        match (floor, light) {
            (Some(f), Some(l)) => Some(if f.distance < l.distance { f } else { l }),
            (f, l) => f.or(l),
        }
    }

    fn evaluate_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, in_dir: Vec3) -> Rgb {
        if point.material != FLOOR {
            return Rgb::ZERO;
        }
        if point.normal.dot(out_dir) * point.normal.dot(in_dir) <= 0.0 {
            return Rgb::ZERO;
        }
        Rgb::splat(ALBEDO / PI)
    }

    fn sample_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, u: Vec2) -> Option<BsdfSample> {
        if point.material != FLOOR {
            return None;
        }
        let normal = if point.normal.dot(out_dir) < 0.0 { -point.normal } else { point.normal };
        let (direction, pdf) = sample_cosine_hemisphere(normal, u);
        Some(BsdfSample {
            direction,
            pdf,
            pdf_reverse: normal.dot(out_dir).abs() / PI,
            weight: Rgb::splat(ALBEDO),
        })
    }

    fn sample_emitter(&self, u_pos: Vec2, u_dir: Vec2) -> Option<EmitterSample> {
        let area = (2.0 * LIGHT_HALF) * (2.0 * LIGHT_HALF);
        let position = Vec3::new(
            (u_pos.x * 2.0 - 1.0) * LIGHT_HALF,
            LIGHT_HEIGHT,
            (u_pos.y * 2.0 - 1.0) * LIGHT_HALF,
        );
        let (direction, pdf_dir) = sample_cosine_hemisphere(-Vec3::Y, u_dir);
        if pdf_dir <= 0.0 {
            return None;
        }
        Some(EmitterSample {
            point: SurfacePoint::new(position, -Vec3::Y, LIGHT),
            direction,
            pdf: pdf_dir / area,
            // Unit radiance: L cos / (pdf_area * pdf_dir) = π A
            weight: Rgb::splat(PI * area),
        })
    }

    fn emitted_radiance(&self, point: &SurfacePoint, out_dir: Vec3) -> Rgb {
        if point.material == LIGHT && point.normal.dot(out_dir) > 0.0 {
            Rgb::ONE
        } else {
            Rgb::ZERO
        }
    }

    fn background_radiance(&self, _ray: &Ray) -> Rgb {
        BACKGROUND
    }

    fn radius(&self) -> f32 {
        2.0
    }
}

/// [`Room`] geometry with a chosen scene radius, optionally reporting hit
/// distances with the wrong sign.
struct Misreported {
    radius: f32,
    negate_distance: bool,
}

impl Scene for Misreported {
    fn trace(&self, ray: &Ray) -> Option<Hit> {
        let mut hit = Room.trace(ray)?;
        if self.negate_distance {
            hit.distance = -hit.distance;
        }
        Some(hit)
    }

    fn evaluate_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, in_dir: Vec3) -> Rgb {
        Room.evaluate_bsdf(point, out_dir, in_dir)
    }

    fn sample_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, u: Vec2) -> Option<BsdfSample> {
        Room.sample_bsdf(point, out_dir, u)
    }

    fn sample_emitter(&self, u_pos: Vec2, u_dir: Vec2) -> Option<EmitterSample> {
        Room.sample_emitter(u_pos, u_dir)
    }

    fn emitted_radiance(&self, point: &SurfacePoint, out_dir: Vec3) -> Rgb {
        Room.emitted_radiance(point, out_dir)
    }

    fn background_radiance(&self, ray: &Ray) -> Rgb {
        Room.background_radiance(ray)
    }

    fn radius(&self) -> f32 {
        self.radius
    }
}

/// Irradiance on the floor directly below the emitter centre.
///
/// Four copies of the unit-radiance rectangle-corner form factor with
/// `X = Y = LIGHT_HALF / LIGHT_HEIGHT`.
fn irradiance_below_light() -> f32 {
    let x = LIGHT_HALF / LIGHT_HEIGHT;
    let s = (1.0 + x * x).sqrt();
    let corner = 0.5 * 2.0 * (x / s) * (x / s).atan();
    4.0 * corner
}

/// Reflected radiance of the floor below the emitter centre (about 0.0588).
fn floor_radiance_below_light() -> f32 {
    ALBEDO / PI * irradiance_below_light()
}

/// Orthographic camera above the floor covering [-1.5, 1.5]².
struct TopDown {
    size: u32,
}

impl Camera for TopDown {
    fn resolution(&self) -> UVec2 {
        UVec2::splat(self.size)
    }

    fn generate_ray(&self, film: Vec2) -> Ray {
        let s = self.size as f32;
        let x = -1.5 + 3.0 * film.x / s;
        let z = -1.5 + 3.0 * film.y / s;
        Ray::new(Vec3::new(x, 3.0, z), -Vec3::Y)
    }
}

fn settings() -> RenderSettings {
    RenderSettings {
        num_iterations: 2,
        num_light_paths: Some(20_000),
        radius_scale: 0.1,
        footprint_angle_deg: 10.0,
        build_parallel_threshold: 1024,
        ..Default::default()
    }
}

fn render(settings: RenderSettings, size: u32) -> (FrameBuffer, photonmap::render::RenderStats) {
    let _ = photonmap::util::init_tracing();
    let camera = TopDown { size };
    let mut film = FrameBuffer::new(size, size);
    let mut renderer = RenderLoop::new(settings).unwrap();
    let stats = renderer.render(&Room, &camera, &mut film).unwrap();
    assert_eq!(renderer.state(), RenderState::Idle);
    (film, stats)
}

#[test]
fn test_render_mock_scene() {
    let (film, stats) = render(settings(), 8);

    assert_eq!(stats.iterations.len(), 2);
    assert_eq!(film.num_iterations(), 2);
    assert_eq!(stats.dropped_vertices(), 0);
    for it in &stats.iterations {
        assert!(it.num_photons > 0);
        assert!(it.cache.num_vertices >= it.num_photons);
    }

    // Corner pixels look past the floor
    assert_eq!(film.pixel(0, 0), Some(BACKGROUND));
    assert_eq!(film.pixel(7, 7), Some(BACKGROUND));

    // Pixel (4, 4) spans [0, 0.375]² next to the point below the light, where
    // the irradiance falls off by up to a third
    let expected = floor_radiance_below_light();
    let center = film.pixel(4, 4).unwrap();
    assert!(center.is_finite());
    assert!(
        center.x > 0.5 * expected && center.x < 1.2 * expected,
        "center {center} expected about {expected}"
    );
    assert!(film.pixels().iter().all(|p| p.is_finite() && p.min_element() >= 0.0));
}

#[test]
fn test_irradiance_below_light() {
    approx::assert_relative_eq!(irradiance_below_light(), 0.230_841, max_relative = 1e-4);
}

#[test]
fn test_center_radiance_matches_analytic() {
    let (film, _) = render(
        RenderSettings {
            num_iterations: 4,
            ..settings()
        },
        16,
    );

    // The four pixels around the point below the light cover [-0.1875, 0.1875]²
    let block = [(7, 7), (7, 8), (8, 7), (8, 8)];
    let mean = block.iter().map(|&(x, y)| film.pixel(x, y).unwrap().x).sum::<f32>() / block.len() as f32;
    let expected = floor_radiance_below_light();
    approx::assert_relative_eq!(mean, expected, max_relative = 0.2);
}

#[test]
fn test_photon_cap_darkens_image() {
    let uncapped = render(settings(), 16).0;
    let capped = render(
        RenderSettings {
            max_photons: Some(10),
            ..settings()
        },
        16,
    )
    .0;
    let center = |film: &FrameBuffer| film.pixel(8, 8).unwrap().x;
    assert!(center(&capped) < 0.5 * center(&uncapped));
}

#[test]
fn test_render_is_deterministic() {
    let (a, _) = render(settings(), 6);
    let (b, _) = render(settings(), 6);
    assert_eq!(a.pixels(), b.pixels());
}

#[test]
fn test_seed_changes_image() {
    let (a, _) = render(settings(), 6);
    let (b, _) = render(
        RenderSettings {
            base_seed_light: 1234,
            ..settings()
        },
        6,
    );
    assert_ne!(a.pixels(), b.pixels());
}

#[test]
fn test_zero_light_paths_aborts() {
    let settings = RenderSettings {
        num_light_paths: None,
        ..settings()
    };
    let camera = TopDown { size: 0 };
    let mut film = FrameBuffer::new(0, 0);
    let mut renderer = RenderLoop::new(settings).unwrap();

    let err = renderer.render(&Room, &camera, &mut film).unwrap_err();
    assert!(matches!(err, Error::ZeroLightPaths));
    assert_eq!(renderer.state(), RenderState::Idle);
}

#[test]
fn test_invalid_scene_radius_aborts() {
    let camera = TopDown { size: 4 };
    let mut film = FrameBuffer::new(4, 4);
    let mut renderer = RenderLoop::new(settings()).unwrap();

    for radius in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        let scene = Misreported {
            radius,
            negate_distance: false,
        };
        let err = renderer.render(&scene, &camera, &mut film).unwrap_err();
        assert!(matches!(err, Error::InvalidRadius(_)), "radius {radius}: {err}");
        assert!(err.is_config_error());
        assert_eq!(renderer.state(), RenderState::Idle);
    }
    assert_eq!(film.num_iterations(), 0);

    // Phases called directly check the radius too
    let flat = Misreported {
        radius: 0.0,
        negate_distance: false,
    };
    assert!(matches!(renderer.trace_light_paths(&flat, 100, 0), Err(Error::InvalidRadius(_))));
    assert_eq!(renderer.state(), RenderState::Idle);

    // A valid scene still renders afterwards
    renderer.render(&Room, &camera, &mut film).unwrap();
    assert_eq!(film.num_iterations(), 2);
}

#[test]
fn test_estimator_error_aborts_render() {
    // Negative hit distances give a negative gather radius at every floor hit
    let scene = Misreported {
        radius: 2.0,
        negate_distance: true,
    };
    let camera = TopDown { size: 4 };
    let mut film = FrameBuffer::new(4, 4);
    let mut renderer = RenderLoop::new(settings()).unwrap();

    let err = renderer.render(&scene, &camera, &mut film).unwrap_err();
    assert!(matches!(err, Error::InvalidRadius(r) if r < 0.0), "{err}");
    assert_eq!(renderer.state(), RenderState::Idle);
    assert!(renderer.photon_map().is_none());
    assert_eq!(film.num_iterations(), 0);

    renderer.render(&Room, &camera, &mut film).unwrap();
    assert_eq!(renderer.state(), RenderState::Idle);
}

#[test]
fn test_phase_order_enforced() {
    let camera = TopDown { size: 4 };
    let film = FrameBuffer::new(4, 4);
    let mut renderer = RenderLoop::new(settings()).unwrap();

    assert!(matches!(
        renderer.trace_camera_paths(&Room, &camera, &film, 0),
        Err(Error::InvalidTransition { .. })
    ));

    renderer.trace_light_paths(&Room, 500, 0).unwrap();
    assert_eq!(renderer.state(), RenderState::TracingLightPaths);
    assert!(matches!(
        renderer.trace_camera_paths(&Room, &camera, &film, 0),
        Err(Error::InvalidTransition {
            from: RenderState::TracingLightPaths,
            to: RenderState::TracingCameraPaths
        })
    ));

    let photons = renderer.build_index().unwrap();
    assert_eq!(renderer.state(), RenderState::IndexBuilt);
    assert_eq!(renderer.photon_map().map(|m| m.len()), Some(photons));

    renderer.trace_camera_paths(&Room, &camera, &film, 0).unwrap();
    assert_eq!(renderer.state(), RenderState::IterationComplete);

    let stats = renderer.finish_iteration().unwrap();
    assert_eq!(stats.num_photons, photons);
    assert_eq!(renderer.state(), RenderState::Idle);
}
