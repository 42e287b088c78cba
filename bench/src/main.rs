//! Benchmark: the `qoi` crate (reference Q-wire decoder) against this
//! crate's own Q and R encode/decode paths, over a directory of PNGs.

use std::{
    fs::File,
    io::BufReader,
    path::Path,
    time::{Duration, Instant},
};

use qoif::{Descriptor, Format, Options};

fn ns() -> Instant {
    Instant::now()
}

struct LibResult {
    size: u64,
    encode_time: Duration,
    decode_time: Duration,
}

impl LibResult {
    fn zero() -> Self {
        LibResult { size: 0, encode_time: Duration::ZERO, decode_time: Duration::ZERO }
    }
}

struct ImageResult {
    count: u32,
    px: u64,
    qoi_crate: LibResult,
    qoif_q: LibResult,
    qoif_r: LibResult,
}

impl ImageResult {
    fn zero() -> Self {
        ImageResult { count: 0, px: 0, qoi_crate: LibResult::zero(), qoif_q: LibResult::zero(), qoif_r: LibResult::zero() }
    }
}

#[inline(never)]
fn benchmark_fn(runs: u32, avg_time: &mut Duration, mut f: impl FnMut()) {
    f();

    let mut time = Duration::ZERO;
    for _ in 0..runs {
        let time_start = ns();
        f();
        time += time_start.elapsed();
    }

    *avg_time = time / runs;
}

fn benchmark_image(path: &Path, runs: u32) -> ImageResult {
    let mut res = ImageResult::zero();

    let image = match image::load(BufReader::new(File::open(path).unwrap()), image::ImageFormat::Png) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Failed to open PNG image {} : {:#}", path.display(), err);
            return res;
        }
    };

    let image = image.to_rgba8();
    let w = image.width();
    let h = image.height();

    res.count = 1;
    res.px = w as u64 * h as u64;

    let pixels = image.as_raw();
    let desc = Descriptor::new(w, h, 4, 0);

    let qoif_q_encoded = qoif::encode_alloc(pixels, &desc, Format::Q, Options::default()).unwrap();
    let qoif_r_encoded = qoif::encode_alloc(pixels, &desc, Format::R, Options::default()).unwrap();

    benchmark_fn(runs, &mut res.qoi_crate.decode_time, || {
        qoi::decode_to_vec(&qoif_q_encoded).unwrap();
    });
    benchmark_fn(runs, &mut res.qoif_q.decode_time, || {
        qoif::decode_alloc(&qoif_q_encoded, 0).unwrap();
    });
    benchmark_fn(runs, &mut res.qoif_r.decode_time, || {
        qoif::decode_alloc(&qoif_r_encoded, 0).unwrap();
    });

    let size = &mut res.qoi_crate.size;
    benchmark_fn(runs, &mut res.qoi_crate.encode_time, || {
        let encoded = qoi::encode_to_vec(pixels, w, h).unwrap();
        *size = encoded.len() as u64;
    });
    let size = &mut res.qoif_q.size;
    benchmark_fn(runs, &mut res.qoif_q.encode_time, || {
        let encoded = qoif::encode_alloc(pixels, &desc, Format::Q, Options::default()).unwrap();
        *size = encoded.len() as u64;
    });
    let size = &mut res.qoif_r.size;
    benchmark_fn(runs, &mut res.qoif_r.encode_time, || {
        let encoded = qoif::encode_alloc(pixels, &desc, Format::R, Options::default()).unwrap();
        *size = encoded.len() as u64;
    });

    res
}

fn print_row(name: &str, px: f64, lib: &LibResult) {
    println!(
        "{:10} {:8.3}    {:8.3}      {:8.3}      {:8.3}  {:8}",
        name,
        lib.decode_time.as_secs_f64() * 1000.0,
        lib.encode_time.as_secs_f64() * 1000.0,
        if lib.decode_time.is_zero() { 0.0 } else { px / (lib.decode_time.as_secs_f64() * 1_000_000.0) },
        if lib.encode_time.is_zero() { 0.0 } else { px / (lib.encode_time.as_secs_f64() * 1_000_000.0) },
        lib.size / 1024,
    );
}

fn print_result(res: &ImageResult) {
    let px = res.px as f64;
    println!("          decode ms   encode ms   decode mpps   encode mpps   size kb");
    print_row("qoi:", px, &res.qoi_crate);
    print_row("qoif-q:", px, &res.qoif_q);
    print_row("qoif-r:", px, &res.qoif_r);
    println!();
}

fn accumulate(total: &mut ImageResult, res: &ImageResult) {
    total.count += res.count;
    total.px += res.px;
    for (t, r) in [
        (&mut total.qoi_crate, &res.qoi_crate),
        (&mut total.qoif_q, &res.qoif_q),
        (&mut total.qoif_r, &res.qoif_r),
    ] {
        t.encode_time += r.encode_time;
        t.decode_time += r.decode_time;
        t.size += r.size;
    }
}

fn average(total: &mut ImageResult) {
    if total.count == 0 {
        return;
    }
    total.px /= total.count as u64;
    for lib in [&mut total.qoi_crate, &mut total.qoif_q, &mut total.qoif_r] {
        lib.encode_time /= total.count;
        lib.decode_time /= total.count;
        lib.size /= total.count as u64;
    }
}

fn benchmark_directory(dirpath: &Path, runs: u32, grand_total: &mut ImageResult) {
    println!("## Benchmarking {}/*.png -- {} runs", dirpath.display(), runs);

    let dir = std::fs::read_dir(dirpath).expect("Couldn't open directory");
    let mut dir_total = ImageResult::zero();

    for entry in dir {
        let entry = entry.unwrap();
        let ft = entry.file_type().unwrap();
        let path = Path::new(dirpath).join(entry.file_name());

        if ft.is_file() {
            if path.extension().map_or(false, |e| e == "png") {
                let res = benchmark_image(&path, runs);
                accumulate(&mut dir_total, &res);
                accumulate(grand_total, &res);
            }
        } else if ft.is_dir() {
            benchmark_directory(&path, runs, grand_total);
        }
    }

    if dir_total.count > 0 {
        average(&mut dir_total);
        println!("## Total for {}\n", dirpath.display());
        print_result(&dir_total);
    }
}

fn main() -> Result<(), ()> {
    let mut args = std::env::args();

    if args.len() < 3 {
        eprintln!("Usage: bench <iterations> <directory>");
        eprintln!("Example: bench 10 images/textures/");
        return Err(());
    }

    args.next();
    let mut runs: u32 = args.next().unwrap().parse().unwrap();
    if runs < 1 {
        runs = 1;
    }
    let dirpath = args.next().unwrap();

    let mut grand_total = ImageResult::zero();
    benchmark_directory(dirpath.as_ref(), runs, &mut grand_total);

    println!();
    if grand_total.count > 0 {
        average(&mut grand_total);
        println!("# Grand total for {}\n", dirpath);
        print_result(&grand_total);
    }

    Ok(())
}
