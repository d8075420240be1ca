//! Spinning textured cube through the full pipeline.
//!
//! Controls  ←/→ = spin faster/slower  Space = pause  Esc = quit
//!
//! ```bash
//! cargo run --release -- --mode hardware --zbuffer --reflect
//! ```

use clap::{Parser, ValueEnum};
use glam::IVec3;
use log::{LevelFilter, Log, Metadata, Record};
use minifb::{Key, Window, WindowOptions};

use phd_rs::engine::{
    DetailLevel, Lighting, ReflectionFilter, RenderConfig, RenderContext, RenderError, RenderMode, WindowParams,
};
use phd_rs::math::matrix::ViewPoint;
use phd_rs::renderer::hardware::{HardwareRasterizer, HwDevice, SoftDevice, StateCache};
use phd_rs::renderer::software::Software;
use phd_rs::renderer::{Rgba, Surface};
use phd_rs::world::{Mesh, TextureBank, cube_words};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Software,
    Hardware,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Detail {
    Low,
    Medium,
    High,
    Ultra,
}

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    #[arg(long, value_enum, default_value = "software")]
    mode: Mode,

    /// Depth-buffer opaque geometry (hardware mode only)
    #[arg(long)]
    zbuffer: bool,

    /// Perspective-correct texturing range
    #[arg(long, value_enum, default_value = "high")]
    detail: Detail,

    /// Environment-mapped overlay on every face
    #[arg(long)]
    reflect: bool,

    #[arg(long, default_value_t = 640)]
    width: usize,

    #[arg(long, default_value_t = 480)]
    height: usize,

    /// Repeat for more log output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// `[level] message` on stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, meta: &Metadata) -> bool {
        meta.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

const CUBE_HALF: i16 = 512;
const CUBE_DISTANCE: i32 = 3000;

enum Backend {
    Software { raster: Software, surface: Surface, frame: Vec<Rgba> },
    Hardware { raster: HardwareRasterizer, cache: StateCache<SoftDevice> },
}

/// A full poly list only costs the rest of the frame.
fn truncated(e: RenderError) -> Result<(), RenderError> {
    match e {
        RenderError::ResourceExhausted(_) => Ok(()),
        e => Err(e),
    }
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("{e}"))?;
    log::set_max_level(match opts.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });

    let config = RenderConfig {
        mode: match opts.mode {
            Mode::Software => RenderMode::Software,
            Mode::Hardware => RenderMode::Hardware,
        },
        zbuffer: opts.zbuffer,
        ..RenderConfig::default()
    }
    .with_detail(match opts.detail {
        Detail::Low => DetailLevel::Low,
        Detail::Medium => DetailLevel::Medium,
        Detail::High => DetailLevel::High,
        Detail::Ultra => DetailLevel::Ultra,
    });

    let (w, h) = (opts.width, opts.height);
    let bank = TextureBank::default_with_checker();
    let cube = Mesh::from_words(&cube_words(CUBE_HALF, 0))?;
    let filter = ReflectionFilter { page: 0, quads: 6, ..ReflectionFilter::default() };

    let mut ctx = RenderContext::new(&WindowParams::fullscreen(w as i32, h as i32), config);
    ctx.set_lighting(Lighting::Directional {
        adder: 0x1000,
        divider: 1,
        vector: IVec3::new(0x1000, 0x2000, -0x2800),
    });

    let mut backend = match opts.mode {
        Mode::Software => Backend::Software {
            raster: Software::new(h),
            surface: Surface::new(w, h),
            frame: vec![0; w * h],
        },
        Mode::Hardware => {
            let mut dev = SoftDevice::new(w, h);
            dev.upload_textures(&bank);
            Backend::Hardware {
                raster: HardwareRasterizer::new(opts.zbuffer),
                cache: StateCache::new(dev),
            }
        }
    };
    log::info!("{:?} backend, {}x{}", ctx.config().backend(), w, h);

    let mut window = Window::new("phd_rs cube", w, h, WindowOptions::default())?;
    window.set_target_fps(60);

    let mut yaw: i16 = 0;
    let mut spin: i16 = 0x100;
    let mut paused = false;

    // ── main loop ───────────────────────────────────────────────────────────
    while window.is_open() && !window.is_key_down(Key::Escape) {
        if window.is_key_pressed(Key::Space, minifb::KeyRepeat::No) {
            paused = !paused;
        }
        if window.is_key_down(Key::Right) {
            spin = spin.saturating_add(8);
        }
        if window.is_key_down(Key::Left) {
            spin = spin.saturating_sub(8);
        }
        if !paused {
            yaw = yaw.wrapping_add(spin);
            ctx.advance_wibble();
        }

        ctx.init_poly_list();
        ctx.ms.generate_view_matrix(&ViewPoint::default());

        ctx.ms.push();
        ctx.ms.translate_abs(0, 0, CUBE_DISTANCE);
        ctx.ms.rot_yxz(yaw, yaw / 2, 0);
        let drawn = if opts.reflect {
            ctx.put_polygons_reflective(&cube, &filter, &bank)
        } else {
            ctx.put_polygons(&cube, true, &bank)
        };
        drawn.or_else(truncated)?;
        ctx.ms.pop();

        ctx.ms.push();
        ctx.ms.translate_abs(0, CUBE_HALF as i32 * 2, CUBE_DISTANCE);
        ctx.insert_shadow(IVec3::ZERO, 700, 700, 0x1800, true)
            .or_else(truncated)?;
        ctx.ms.pop();

        ctx.sort_poly_list();

        match &mut backend {
            Backend::Software { raster, surface, frame } => {
                surface.clear(0);
                raster.draw_poly_list(ctx.poly_list(), &bank, surface);
                surface.to_rgba(bank.palette(), frame);
                window.update_with_buffer(frame, w, h)?;
            }
            Backend::Hardware { raster, cache } => {
                cache.device_mut().begin_frame(w, h);
                raster.draw_poly_list(ctx.poly_list(), cache);
                log::trace!("{} state changes", cache.changes());
                cache.invalidate();
                let mut shown = Ok(());
                cache
                    .device_mut()
                    .end_frame(|buf, fw, fh| shown = window.update_with_buffer(buf, fw, fh));
                shown?;
            }
        }
    }
    Ok(())
}
