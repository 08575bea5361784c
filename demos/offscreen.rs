// eglquad/demos/offscreen.rs
//
//! Renders a bitmap into an off-screen surface on a render worker and writes the result to a
//! PNG file.

use clap::{App, Arg};
use eglquad::{DefaultPlatform, Image, RenderTarget, RenderWorker, WorkerOptions, WorkerState};
use euclid::default::Size2D;
use std::path::PathBuf;
use std::process;

const DEFAULT_WIDTH: i32 = 640;
const DEFAULT_HEIGHT: i32 = 480;

static APP_NAME: &'static str = "eglquad offscreen example";

fn main() {
    env_logger::init();

    let matches = App::new(APP_NAME)
        .arg(
            Arg::with_name("width")
                .short("W")
                .long("width")
                .takes_value(true)
                .help("Surface width in pixels"),
        )
        .arg(
            Arg::with_name("height")
                .short("H")
                .long("height")
                .takes_value(true)
                .help("Surface height in pixels"),
        )
        .arg(
            Arg::with_name("diagonal")
                .short("d")
                .long("diagonal")
                .help("Draw a diagonal line over the bitmap"),
        )
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .index(1)
                .help("Input PNG file"),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .required(true)
                .index(2)
                .help("Output PNG file"),
        )
        .get_matches();

    let dimension = |name: &str, default: i32| match matches.value_of(name) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            eprintln!("{}: invalid {} '{}'", APP_NAME, name, value);
            process::exit(2);
        }),
    };
    let size = Size2D::new(
        dimension("width", DEFAULT_WIDTH),
        dimension("height", DEFAULT_HEIGHT),
    );

    let bitmap = Image::open_png(matches.value_of("INPUT").unwrap()).unwrap();
    let output_path = PathBuf::from(matches.value_of("OUTPUT").unwrap());

    let options = WorkerOptions {
        save_path: Some(output_path.clone()),
        ..WorkerOptions::default()
    };
    let mut worker = RenderWorker::spawn(DefaultPlatform::default(), options).unwrap();
    worker
        .load_bitmap(bitmap, matches.is_present("diagonal"))
        .unwrap();
    worker
        .target_available(RenderTarget::Offscreen(size))
        .unwrap();
    worker.join();

    assert_eq!(worker.state(), WorkerState::Done);
    match worker.failure() {
        None => println!(
            "rendered {}x{} into {}",
            size.width,
            size.height,
            output_path.display()
        ),
        Some(failure) => {
            eprintln!("{}: {}", APP_NAME, failure);
            process::exit(1);
        }
    }
}
