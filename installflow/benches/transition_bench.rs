//! Benchmarks for the transition table and fault rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use installflow::core::{transition, InstallationStep, SequencerEvent};
use installflow::errors::short_description;

fn transition_benchmark(c: &mut Criterion) {
    let path = [
        (InstallationStep::MainInstallation, SequencerEvent::CommittingFiles),
        (InstallationStep::WaitForFiles, SequencerEvent::TaskDisappeared),
        (InstallationStep::WaitForFiles, SequencerEvent::TaskFinished),
        (InstallationStep::InstallSecurity, SequencerEvent::TaskFinished),
        (InstallationStep::RunPostAction, SequencerEvent::TaskFinished),
        (InstallationStep::Done, SequencerEvent::Abort),
    ];

    c.bench_function("transition_full_path", |b| {
        b.iter(|| {
            for (step, event) in &path {
                black_box(transition(black_box(*step), event, true));
            }
        });
    });
}

fn short_description_benchmark(c: &mut Criterion) {
    let message = "Item /content/home could not be saved (method: Data.Items.Item.Save)";
    c.bench_function("short_description", |b| {
        b.iter(|| black_box(short_description(black_box(message))));
    });
}

criterion_group!(benches, transition_benchmark, short_description_benchmark);
criterion_main!(benches);
