//! Code generation benchmarks
//!
//! Measures the per-drawable path: binding resolution, cache key
//! computation and full source generation for a lit mesh.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use shadergen::{
    BufferArrayRange, BufferResource, CapabilityFlags, CodeGen, CodegenSettings, DrawItem, DrawMode,
    GeometricShader, PrimitiveType, RenderCaps, ResourceBinder, ShaderCode, ShaderParam, ShaderStage,
    SurfaceShader,
};

fn mesh_draw_item(instance_levels: usize) -> DrawItem {
    let mut draw_item = DrawItem::new()
        .with_constant(
            BufferArrayRange::new()
                .with_resource("transform", BufferResource::new("mat4", 16, 0).with_buffer(1))
                .with_resource("displayColor", BufferResource::new("vec3", 3, 64).with_buffer(1)),
        )
        .with_vertex(
            BufferArrayRange::new()
                .with_resource("points", BufferResource::new("vec3", 3, 0).with_buffer(2))
                .with_resource("normals", BufferResource::new("vec3", 3, 0).with_buffer(3)),
        )
        .with_topology(
            BufferArrayRange::new()
                .with_resource("indices", BufferResource::new("ivec3", 3, 0).with_buffer(4))
                .with_resource("primitiveParam", BufferResource::new("int", 1, 0).with_buffer(5)),
        )
        .with_face_varying(
            BufferArrayRange::new().with_resource("st", BufferResource::new("vec2", 2, 0).with_buffer(6)),
        );
    for level in 0..instance_levels {
        draw_item = draw_item.with_instance_level(Some(
            BufferArrayRange::new()
                .with_resource("translate", BufferResource::new("vec3", 3, 0).with_buffer(10 + level as u32)),
        ));
    }
    draw_item
}

fn shader_stack() -> (Arc<GeometricShader>, Vec<Arc<dyn ShaderCode>>) {
    let geometric = Arc::new(
        [ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment]
            .iter()
            .fold(GeometricShader::new(PrimitiveType::Triangles), |shader, stage| {
                shader.with_stage(*stage, "void main() {}\n")
            }),
    );
    let surface = SurfaceShader::new()
        .with_param(ShaderParam::fallback("roughness", "float"))
        .with_param(ShaderParam::primvar("color", "vec3", "displayColor"));
    (geometric, vec![Arc::new(surface) as Arc<dyn ShaderCode>])
}

fn bench_codegen(c: &mut Criterion) {
    let caps = RenderCaps::new(450, CapabilityFlags::STORAGE_BUFFER | CapabilityFlags::SHADING_LANGUAGE_420PACK);
    let (geometric, shaders) = shader_stack();

    let mut group = c.benchmark_group("shadergen");

    for levels in [0usize, 2] {
        let draw_item = mesh_draw_item(levels);

        group.bench_with_input(BenchmarkId::new("resolve", levels), &draw_item, |b, draw_item| {
            b.iter(|| {
                let mut binder = ResourceBinder::new(5);
                let md = binder.resolve_bindings(&caps, black_box(draw_item), &shaders, &[], DrawMode::default());
                black_box(md);
            });
        });

        let md = ResourceBinder::new(5).resolve_bindings(&caps, &draw_item, &shaders, &[], DrawMode::default());
        let codegen = CodeGen::new(
            geometric.clone(),
            shaders.clone(),
            md,
            caps,
            CodegenSettings::default(),
        );

        group.bench_function(BenchmarkId::new("hash", levels), |b| {
            b.iter(|| black_box(black_box(&codegen).compute_hash()));
        });

        group.bench_function(BenchmarkId::new("generate", levels), |b| {
            b.iter(|| {
                let sources = black_box(&codegen).generate().unwrap();
                black_box(sources.digest());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codegen);
criterion_main!(benches);
