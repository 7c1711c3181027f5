#![allow(missing_docs)]

use binser::color::{PackedColor, Rgba8888};
use binser::{
    Binser, Context, EncodedOptions, Endian, MemoryFile, NoEncoding, ObjectPointer, ObjectState,
    Pointer, PointerOptions, Result, Serializable, SerializerExt, SerializerObject,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

#[derive(Debug, Default)]
struct Vertex {
    state: ObjectState,
    position: [f32; 3],
    color: PackedColor<Rgba8888>,
    flags: u8,
    bone: u8,
}

const VERTEX_SIZE: u64 = 18;

impl Serializable for Vertex {
    #[allow(clippy::cast_possible_truncation)]
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        for (p, axis) in self.position.iter_mut().zip(["x", "y", "z"]) {
            *p = s.serialize(*p, axis)?;
        }
        s.serialize_object(&mut self.color, "color")?;
        let (mut flags, mut bone) = (self.flags, self.bone);
        s.serialize_bits::<u16>(|bits| {
            flags = bits.value(u64::from(flags), 8, "flags") as u8;
            bone = bits.value(u64::from(bone), 8, "bone") as u8;
            Ok(())
        })?;
        self.flags = flags;
        self.bone = bone;
        Ok(())
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

#[derive(Debug, Default)]
struct Mesh {
    state: ObjectState,
    vertices: Vec<Vertex>,
}

impl Serializable for Mesh {
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        let count = s.serialize_array_size::<u32, _>(&self.vertices, "vertices")?;
        s.serialize_object_array(&mut self.vertices, count, "vertices")
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn generate_mesh(count: usize) -> Mesh {
    let vertices = (0..count)
        .map(|i| Vertex {
            position: [i as f32, (i * 2) as f32, (i * 3) as f32],
            color: PackedColor::from_rgba(1.0, 0.5, 0.25, 1.0),
            flags: (i % 256) as u8,
            bone: 3,
            ..Vertex::default()
        })
        .collect();
    Mesh {
        vertices,
        ..Mesh::default()
    }
}

// --- BENCHMARKS ---

fn bench_flat_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_write");
    for count in [1_000usize, 10_000] {
        let mut mesh = generate_mesh(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| Binser::to_bytes(black_box(&mut mesh), Endian::Little));
        });
    }
    group.finish();
}

#[derive(Debug)]
struct Table {
    state: ObjectState,
    entries: Vec<ObjectPointer<Vertex>>,
}

impl Serializable for Table {
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        let count = self.entries.len();
        s.serialize_object_pointer_array(
            &mut self.entries,
            count,
            PointerOptions::new().resolved(),
            "entries",
        )
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

fn bench_shared_pointers(c: &mut Criterion) {
    // Every entry points at one of a few shared vertices; the ledger skips repeats.
    let entries = 10_000usize;
    let shared = 16usize;

    let mut ctx = Context::default();
    let file = ctx.add_file(MemoryFile::new("table"));
    let Ok(start) = ctx.file_pointer(file) else {
        return;
    };
    let data = start + (entries * 4) as u64;
    let ids: Vec<_> = generate_mesh(shared)
        .vertices
        .into_iter()
        .map(|v| ctx.objects_mut().insert(v))
        .collect();
    let mut table = Table {
        state: ObjectState::new(),
        entries: (0..entries)
            .map(|i| {
                let slot = i % shared;
                ObjectPointer::new(Some(data + slot as u64 * VERTEX_SIZE), Some(ids[slot]))
            })
            .collect(),
    };

    c.bench_function("shared_pointers", |b| {
        b.iter(|| Binser::write(&mut ctx, start, black_box(&mut table)));
    });
}

fn write_region(ctx: &mut Context, start: Pointer, buffer: &mut Vec<u8>) -> Result<()> {
    let count = buffer.len();
    let mut s = ctx.serializer();
    s.goto(Some(start))?;
    s.do_encoded(
        &NoEncoding,
        EncodedOptions::new(),
        &mut |s: &mut dyn SerializerObject| s.serialize_bytes(buffer, count, "data"),
    )?;
    s.dispose()
}

fn bench_encoded_region(c: &mut Criterion) {
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let mut ctx = Context::default();
    let file = ctx.add_file(MemoryFile::new("blob"));
    let Ok(start) = ctx.file_pointer(file) else {
        return;
    };

    let mut group = c.benchmark_group("encoded_region");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("passthrough", |b| {
        b.iter(|| {
            let mut buffer = payload.clone();
            black_box(write_region(&mut ctx, start, &mut buffer))
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_flat_write,
    bench_shared_pointers,
    bench_encoded_region
);
criterion_main!(benches);
