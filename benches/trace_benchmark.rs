use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::time::Duration;
use tracemon::buffer::{IndexedSlot, TraceBuffer, TraceBufferBuilder};
use tracemon::cursor::CursorReader;
use tracemon::event::Event;
use tracemon::mtl::{Formula, Term, TimeBound, evaluate};
use tracemon::reader::Reader;

// ---
// Fixtures
// ---

// Values cycle through 0..10, one event every 0.5s to 1.5s.
fn filled_buffer(size: usize) -> TraceBuffer<u8> {
    let mut rng = StdRng::seed_from_u64(7);
    let buffer = TraceBuffer::new(size).unwrap();
    let mut time = Duration::ZERO;
    for i in 0..size {
        let _ = buffer.push(Event::new((i % 10) as u8, time)).unwrap();
        time += Duration::from_millis(rng.random_range(500..1500));
    }
    buffer
}

fn response_formula() -> Formula<u8> {
    // G<50 (x == 3 -> F<5 (x == 7))
    Formula::always(
        TimeBound::Less(Duration::from_secs(50)),
        Formula::implies(
            Formula::prop(3),
            Formula::eventually(TimeBound::Less(Duration::from_secs(5)), Formula::prop(7)),
        ),
    )
}

fn duty_formula() -> Formula<u8> {
    // ∫100 (x == 0) < 20
    Formula::less(
        Term::duration(Duration::from_secs(100), Formula::prop(0)),
        Term::Constant(Duration::from_secs(20)),
    )
}

// ---
// The Benchmark Functions
// ---

fn benchmark_buffer(c: &mut Criterion) {
    let size = 1000;
    let mut group = c.benchmark_group(format!("Trace buffer, {size} events"));
    group.throughput(Throughput::Elements(size as u64));

    group.bench_function("push_packed", |b| {
        let buffer = TraceBuffer::new(size / 4).unwrap();
        b.iter(|| {
            for i in 0..size {
                let _ = black_box(buffer.push(Event::new(i, Duration::from_nanos(i as u64))));
            }
        });
    });

    group.bench_function("push_indexed", |b| {
        let buffer = TraceBufferBuilder::<usize, IndexedSlot>::new()
            .capacity(size / 4)
            .build()
            .unwrap();
        b.iter(|| {
            for i in 0..size {
                let _ = black_box(buffer.push(Event::new(i, Duration::from_nanos(i as u64))));
            }
        });
    });

    group.bench_function("reader_pull", |b| {
        let buffer = filled_buffer(size);
        b.iter_batched(
            || {
                let mut reader = Reader::new(&buffer);
                reader.synchronize().unwrap();
                reader
            },
            |mut reader| {
                while let Ok(event) = reader.pull() {
                    black_box(event);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_evaluation(c: &mut Criterion) {
    let size = 1000;
    let buffer = filled_buffer(size);
    let mut group = c.benchmark_group(format!("Formula evaluation, {size} events"));

    for (name, formula) in [("response", response_formula()), ("duty", duty_formula())] {
        group.bench_function(name, |b| {
            let mut cursor = CursorReader::new(&buffer);
            cursor.synchronize().unwrap();
            b.iter(|| black_box(evaluate(&formula, &mut cursor, Duration::from_secs(100))));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_buffer, benchmark_evaluation);
criterion_main!(benches);
