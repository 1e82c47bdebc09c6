use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sweetscout::core::assembly::ResponseAssembly;
use sweetscout::core::prompt::Language;
use sweetscout::ui::paint::paint_response;
use sweetscout::ui::theme::Theme;

const SECTION: &str = "## Kẹo dẻo\n**Tổng quan**\nA is chewy and **sweet**, B is sour. ![A](https://img.example/a.png)\n- Price: 25,000 VND\n- Flavor: strawberry\n| Product | Price | Flavor |\n|---|---|---|\n| A | 25,000 | Sweet |\n| B | 30,000 | Sour |\n\n";

const CHART: &str = "```json\n{\"type\":\"radar\",\"title\":\"Scores\",\"categories\":[\"Taste\",\"Value\",\"Texture\",\"Packaging\"],\"series\":[{\"label\":\"A\",\"data\":[8,6,7,9]},{\"label\":\"B\",\"data\":[7,9,5,6]}]}\n```\n";

fn make_answer(sections: usize) -> String {
    let mut answer = SECTION.repeat(sections);
    answer.push_str(CHART);
    answer
}

fn fragments(answer: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = answer;
    while !rest.is_empty() {
        let mut cut = rest.len().min(size);
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces
}

fn bench_render_pipeline(c: &mut Criterion) {
    let theme = Theme::fixed();
    let width = 100u16;

    for &sections in &[4usize, 32usize] {
        let answer = make_answer(sections);
        let pieces = fragments(&answer, 24);

        let mut group = c.benchmark_group(format!("render_pipeline_sections{sections}"));
        group.throughput(Throughput::Bytes(answer.len() as u64));

        group.bench_function(BenchmarkId::new("final_paint", width), |b| {
            let mut assembly = ResponseAssembly::new();
            assembly.push_fragment(&answer, Vec::new());
            let snapshot = assembly.snapshot(false);
            b.iter(|| paint_response(&snapshot, Language::En, width, &theme))
        });

        // Every fragment produces a snapshot that is painted, as while streaming.
        group.bench_function(BenchmarkId::new("streamed_paint", width), |b| {
            b.iter(|| {
                let mut assembly = ResponseAssembly::new();
                let mut painted = 0usize;
                for piece in &pieces {
                    assembly.push_fragment(piece, Vec::new());
                    let snapshot = assembly.snapshot(true);
                    painted += paint_response(&snapshot, Language::En, width, &theme).len();
                }
                painted
            })
        });

        group.finish();
    }
}

criterion_group!(benches, bench_render_pipeline);
criterion_main!(benches);
