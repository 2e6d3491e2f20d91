mod common;

use common::{init_tracing, secs};
use rstest::rstest;
use std::time::Duration;
use tracemon::buffer::TraceBuffer;
use tracemon::clock::ManualClock;
use tracemon::monitor::{FormulaMonitor, PeriodicTask, Schedule, SchedulePolicy};
use tracemon::mtl::{Formula, TimeBound, Verdict};
use tracemon::writer::Writer;

fn drive(tasks: &mut [&mut dyn PeriodicTask]) -> Vec<Verdict> {
    tasks.iter_mut().map(|task| task.run()).collect()
}

#[rstest]
#[case(TimeBound::Less(secs(4)), Verdict::True)]
#[case(TimeBound::Less(secs(2)), Verdict::False)]
#[case(TimeBound::Equal(secs(3)), Verdict::True)]
#[case(TimeBound::Unbounded, Verdict::True)]
fn response_within_bound(#[case] bound: TimeBound, #[case] expected: Verdict) {
    init_tracing();
    let buffer = TraceBuffer::new(16).unwrap();
    let clock = ManualClock::new(secs(1));
    let mut writer = Writer::with_clock(&buffer, &clock);
    let mut monitor = FormulaMonitor::builder()
        .formula(Formula::eventually(bound, Formula::prop("ack")))
        .origin(secs(1))
        .build(&buffer)
        .unwrap();

    let _ = writer.push("req").unwrap();
    assert_eq!(monitor.run(), Verdict::Unknown);
    clock.advance(secs(3));
    let _ = writer.push("ack").unwrap();
    clock.advance(secs(3));
    let _ = writer.push("idle").unwrap();
    assert_eq!(monitor.run(), expected);
}

#[test]
fn monitors_share_one_trace() {
    let buffer = TraceBuffer::new(16).unwrap();
    let clock = ManualClock::new(secs(0));
    let mut writer = Writer::with_clock(&buffer, &clock);

    let mut safety = FormulaMonitor::builder()
        .formula(Formula::always(
            TimeBound::Less(secs(5)),
            Formula::not(Formula::prop('e')),
        ))
        .schedule(Schedule::new(Duration::from_millis(10), SchedulePolicy::Fifo, 80))
        .build(&buffer)
        .unwrap();
    let mut liveness = FormulaMonitor::builder()
        .formula(Formula::eventually(TimeBound::Less(secs(5)), Formula::prop('e')))
        .period(Duration::from_millis(50))
        .build(&buffer)
        .unwrap();

    for (data, t) in [('a', 0), ('b', 2), ('e', 3), ('a', 6)] {
        clock.set(secs(t));
        let _ = writer.push(data).unwrap();
    }

    let mut tasks: [&mut dyn PeriodicTask; 2] = [&mut safety, &mut liveness];
    assert_eq!(drive(&mut tasks), vec![Verdict::False, Verdict::True]);
    assert!(safety.period() < liveness.period());
}

#[test]
fn verdict_survives_the_ring_overwriting_its_origin() {
    let buffer = TraceBuffer::new(3).unwrap();
    let clock = ManualClock::new(secs(1));
    let mut writer = Writer::with_clock(&buffer, &clock);
    let mut monitor = FormulaMonitor::builder()
        .formula(Formula::prop(0u32))
        .origin(secs(1))
        .build(&buffer)
        .unwrap();

    let _ = writer.push(0).unwrap();
    clock.advance(secs(1));
    let _ = writer.push(1).unwrap();
    assert_eq!(monitor.run(), Verdict::True);

    for i in 2..8 {
        clock.advance(secs(1));
        let _ = writer.push(i).unwrap();
    }
    assert_eq!(monitor.run(), Verdict::True);
    assert_eq!(monitor.verdict(), Verdict::True);
    assert!(!monitor.cursor().gap());

    // A fresh origin that the ring no longer holds has no verdict yet.
    monitor.set_origin(secs(2));
    assert_eq!(monitor.run(), Verdict::Unknown);
}

#[test]
fn concurrent_writer_and_monitor() {
    init_tracing();
    let buffer = TraceBuffer::new(64).unwrap();
    let clock = ManualClock::new(secs(1));

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut writer = Writer::with_clock(&buffer, &clock);
            for _ in 0..20 {
                let _ = writer.push('w').unwrap();
                clock.advance(Duration::from_millis(100));
            }
            let _ = writer.push('d').unwrap();
            clock.advance(secs(10));
            let _ = writer.push('w').unwrap();
        });

        s.spawn(|| {
            let mut monitor = FormulaMonitor::builder()
                .formula(Formula::eventually(TimeBound::Less(secs(5)), Formula::prop('d')))
                .origin(secs(1))
                .period(Duration::from_millis(1))
                .build(&buffer)
                .unwrap();
            let mut verdict = monitor.run();
            while verdict == Verdict::Unknown {
                std::thread::sleep(monitor.period());
                verdict = monitor.run();
            }
            assert_eq!(verdict, Verdict::True);
        });
    });
}
