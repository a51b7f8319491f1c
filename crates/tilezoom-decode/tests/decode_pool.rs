use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tilezoom_core::{BufferSpec, Orientation, PixelBuffer, PixelFormat, Rect, Size};
use tilezoom_decode::{
    BufferAllocator, BufferPool, DecodeResult, FileImageSource, ImageRegionDecoderFactory,
    ImageSource, MemoryImageSource, RegionDecodePool, RegionDecoder, RegionDecoderFactory,
    output_spec, read_image_info,
};

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).expect("encode png");
    out.into_inner()
}

/// Open/closed latch plus a count of decodes that reached it.
#[derive(Default)]
struct Gate {
    state: Mutex<(bool, usize)>,
    cond: Condvar,
}

impl Gate {
    fn enter(&self) {
        let mut state = self.state.lock().unwrap();
        state.1 += 1;
        self.cond.notify_all();
        while !state.0 {
            state = self.cond.wait(state).unwrap();
        }
    }

    fn wait_entered(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        while state.1 < n {
            state = self.cond.wait(state).unwrap();
        }
    }

    fn open(&self) {
        self.state.lock().unwrap().0 = true;
        self.cond.notify_all();
    }
}

struct GatedDecoder {
    size: Size,
    gate: Arc<Gate>,
}

impl RegionDecoder for GatedDecoder {
    fn raw_size(&self) -> Size {
        self.size
    }

    fn decode_region(
        &mut self,
        rect: Rect,
        sample_size: u32,
        reuse: &mut Option<PixelBuffer>,
    ) -> DecodeResult<PixelBuffer> {
        self.gate.enter();
        let spec = output_spec(rect, sample_size, PixelFormat::Rgba8);
        Ok(reuse.take().unwrap_or_else(|| PixelBuffer::new(spec)))
    }
}

struct GatedFactory {
    size: Size,
    gate: Arc<Gate>,
    opened: AtomicUsize,
}

impl RegionDecoderFactory for GatedFactory {
    fn open(&self, _source: &dyn ImageSource) -> DecodeResult<Box<dyn RegionDecoder>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(GatedDecoder {
            size: self.size,
            gate: Arc::clone(&self.gate),
        }))
    }
}

/// Allocator that counts every buffer it hands out or takes back.
#[derive(Default)]
struct CountingAllocator {
    allocated: AtomicUsize,
    recycled: AtomicUsize,
}

impl BufferAllocator for CountingAllocator {
    fn try_reuse(&self, _spec: BufferSpec) -> Option<PixelBuffer> {
        None
    }

    fn recycle(&self, _buffer: PixelBuffer) {
        self.recycled.fetch_add(1, Ordering::SeqCst);
    }

    fn allocate(&self, spec: BufferSpec) -> PixelBuffer {
        self.allocated.fetch_add(1, Ordering::SeqCst);
        PixelBuffer::new(spec)
    }
}

fn gated_pool(gate: &Arc<Gate>) -> (Arc<GatedFactory>, Arc<CountingAllocator>, Arc<RegionDecodePool>) {
    let factory = Arc::new(GatedFactory {
        size: Size::new(1200, 400),
        gate: Arc::clone(gate),
        opened: AtomicUsize::new(0),
    });
    let alloc = Arc::new(CountingAllocator::default());
    let source: Arc<dyn ImageSource> = Arc::new(MemoryImageSource::new("mem:gated", vec![0u8]));
    let pool = RegionDecodePool::open(source, factory.clone(), alloc.clone(), Orientation::Normal)
        .expect("open pool");
    (factory, alloc, Arc::new(pool))
}

#[test]
fn decodes_png_file_region() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradient.png");
    std::fs::write(&path, gradient_png(64, 48)).unwrap();

    let source: Arc<dyn ImageSource> = Arc::new(FileImageSource::new(&path));
    let info = read_image_info(source.as_ref()).unwrap();
    assert_eq!(info.display_size(), Size::new(64, 48));

    let pool = RegionDecodePool::open(
        source,
        Arc::new(ImageRegionDecoderFactory),
        Arc::new(BufferPool::default()),
        info.orientation,
    )
    .unwrap();
    let tile = pool.decode(Rect::new(16, 8, 32, 32), 2).unwrap();
    assert_eq!(tile.size(), Size::new(16, 16));
    // First block averages x in {16, 17}, y in {8, 9}.
    assert_eq!(&tile.pixel(0, 0)[..2], &[17, 9]);
}

#[test]
fn concurrent_decodes_open_extra_handles() {
    let gate = Arc::new(Gate::default());
    let (factory, _alloc, pool) = gated_pool(&gate);

    let workers: Vec<_> = (0..3)
        .map(|i| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.decode(Rect::new(i * 400, 0, 400, 400), 1))
        })
        .collect();
    gate.wait_entered(3);
    assert_eq!(factory.opened.load(Ordering::SeqCst), 3);
    gate.open();

    for w in workers {
        assert_eq!(w.join().unwrap().unwrap().size(), Size::new(400, 400));
    }
    assert_eq!(pool.idle_handles(), 3);
    assert_eq!(pool.stats().decoded, 3);
}

#[test]
fn destroy_during_decode_discards_result() {
    let gate = Arc::new(Gate::default());
    let (_factory, alloc, pool) = gated_pool(&gate);

    let worker = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.decode(Rect::new(0, 0, 400, 400), 1))
    };
    gate.wait_entered(1);
    pool.destroy();
    gate.open();

    assert!(worker.join().unwrap().is_none());
    assert_eq!(pool.idle_handles(), 0);
    assert_eq!(pool.stats().discarded, 1);
    // The decoded pixels went straight back to the allocator.
    assert_eq!(alloc.recycled.load(Ordering::SeqCst), 1);
    assert!(pool.decode(Rect::new(0, 0, 400, 400), 1).is_none());
}

#[test]
fn orientation_corrects_decoded_tiles() {
    // Raw 6x4, stored rotated so the display image is 4x6.
    let source: Arc<dyn ImageSource> =
        Arc::new(MemoryImageSource::new("mem:rot", gradient_png(6, 4)));
    let pool = RegionDecodePool::open(
        source,
        Arc::new(ImageRegionDecoderFactory),
        Arc::new(BufferPool::default()),
        Orientation::Rotate270,
    )
    .unwrap();
    assert_eq!(pool.display_size(), Size::new(4, 6));

    let tile = pool.decode(Rect::new(0, 0, 4, 6), 1).unwrap();
    assert_eq!(tile.size(), Size::new(4, 6));
    for v in 0..6 {
        for u in 0..4 {
            // Rotate270 reads raw (w - 1 - v, u).
            assert_eq!(&tile.pixel(u, v)[..2], &[(5 - v) as u8, u as u8]);
        }
    }
}
