use std::any::TypeId;
use std::hint::black_box;

use courier_core::{
    request_as, Annotation, BackendRequest, CallArgs, Declaration, Extract, MarkerError,
    MarkerTable, MethodDecl, Param, ParameterMarker, Signature, TypeExpr, TypeScope,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

#[derive(Debug, Default)]
struct Pairs(Vec<(&'static str, Value)>);

#[derive(Debug)]
struct Pair(&'static str);

impl ParameterMarker for Pair {
    fn prepare_request(&self, request: &mut dyn BackendRequest, value: &Value) -> Result<(), MarkerError> {
        request_as::<Pairs>(request, "Pair")?.0.push((self.0, value.clone()));
        Ok(())
    }
}

impl From<Pair> for Annotation {
    fn from(marker: Pair) -> Self {
        Annotation::parameter(marker)
    }
}

const NAMES: [&str; 8] = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"];

fn declaration(params: usize) -> (Declaration, MethodDecl) {
    let method = MethodDecl {
        name: "call".into(),
        doc: None,
        params: NAMES[..params]
            .iter()
            .map(|&name| Param::new(name, TypeExpr::of::<i64>().annotate(Pair(name))))
            .collect(),
        returns: Some(TypeExpr::of::<Vec<i64>>().annotate(Extract::new("data"))),
        receiver: true,
    };
    let declaration = Declaration {
        type_id: TypeId::of::<Pairs>(),
        name: "Bench".into(),
        doc: None,
        scope: TypeScope::new(),
        methods: vec![method.clone()],
        markers: MarkerTable::new(),
    };
    (declaration, method)
}

fn bench_signature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_extraction");

    for params in [1, 4, 8].iter() {
        let (declaration, method) = declaration(*params);
        group.bench_with_input(BenchmarkId::new("extract", params), params, |b, _| {
            b.iter(|| black_box(Signature::extract(&declaration, &method).unwrap()))
        });
    }

    group.finish();
}

fn bench_request_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_building");

    for params in [1, 4, 8].iter() {
        let (declaration, method) = declaration(*params);
        let signature = Signature::extract(&declaration, &method).unwrap();
        group.bench_with_input(BenchmarkId::new("build", params), params, |b, &params| {
            b.iter(|| {
                let call = (0..params).fold(CallArgs::new(), |call, i| call.arg(i as i64));
                let request: Pairs = signature.build_request(call).unwrap();
                black_box(request)
            })
        });
    }

    group.finish();
}

fn bench_finalize(c: &mut Criterion) {
    let (declaration, method) = declaration(1);
    let signature = Signature::extract(&declaration, &method).unwrap();
    let payload = json!({"data": (0..64).collect::<Vec<i64>>()});

    c.bench_function("finalize", |b| {
        b.iter(|| black_box(signature.finalize(&(), payload.clone()).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_signature_extraction,
    bench_request_building,
    bench_finalize
);
criterion_main!(benches);
