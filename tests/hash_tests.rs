//! Hashing and resolution property tests
//!
//! Tests for:
//! - Metadata hash equality for equal plans and difference for any single change
//! - Binding allocator monotonicity per storage class
//! - Resolution idempotence

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use shadergen::binding::{PrimVar, StructBlock, StructEntry};
use shadergen::{
    Binding, BindingAllocator, BufferArrayRange, BufferResource, CapabilityFlags, DrawItem, DrawMode,
    Metadata, RenderCaps, ResourceBinder, StorageClass, interner,
};

const ITERATIONS: usize = 200;
const MAX_CHANNELS: usize = 64;
const TYPES: [&str; 6] = ["float", "vec2", "vec3", "vec4", "int", "mat4"];

// ============================================================================
// Helpers
// ============================================================================

fn random_type(rng: &mut StdRng) -> &'static str {
    TYPES[rng.random_range(0..TYPES.len())]
}

fn random_metadata(rng: &mut StdRng, tag: usize) -> Metadata {
    let mut md = Metadata::new();

    let mut block = StructBlock::new("constantPrimvars");
    for i in 0..rng.random_range(1..=16usize) {
        block.entries.push(StructEntry::new(
            &format!("constant{tag}_{i}"),
            random_type(rng),
            (i * 16) as u32,
            rng.random_range(1..=4u32),
        ));
    }
    md.constant_data
        .insert(Binding::new(StorageClass::StorageBlock, 0, 0), block);

    for i in 0..rng.random_range(0..=MAX_CHANNELS) {
        md.vertex_data.insert(
            Binding::new(StorageClass::VertexAttr, i as u32, 0),
            PrimVar::new(&format!("vertex{tag}_{i}"), random_type(rng)),
        );
    }
    for i in 0..rng.random_range(1..=MAX_CHANNELS) {
        md.element_data.insert(
            Binding::new(StorageClass::StorageBlock, i as u32 + 1, 0),
            PrimVar::new(&format!("element{tag}_{i}"), random_type(rng)),
        );
    }
    md
}

fn constant_block(md: &mut Metadata) -> &mut StructBlock {
    md.constant_data.values_mut().next().unwrap()
}

// ============================================================================
// Metadata hash
// ============================================================================

#[test]
fn equal_metadata_hashes_equal() {
    let mut rng = StdRng::seed_from_u64(42);
    for tag in 0..ITERATIONS {
        let md = random_metadata(&mut rng, tag);
        assert_eq!(md.compute_hash(), md.clone().compute_hash());
    }
}

#[test]
fn hash_does_not_depend_on_interning_order() {
    let names = ["zebraChannel", "alphaChannel", "middleChannel"];
    let build = |order: &[usize]| {
        for &i in order {
            interner::intern(names[i]);
        }
        let mut md = Metadata::new();
        for (i, name) in names.iter().enumerate() {
            md.vertex_data.insert(
                Binding::new(StorageClass::VertexAttr, i as u32, 0),
                PrimVar::new(name, "vec3"),
            );
        }
        md.compute_hash()
    };
    assert_eq!(build(&[2, 1, 0]), build(&[0, 1, 2]));
}

#[test]
fn single_change_changes_hash() {
    let mut rng = StdRng::seed_from_u64(7);
    for tag in 0..ITERATIONS {
        let base = random_metadata(&mut rng, tag);
        let hash = base.compute_hash();

        // offset
        let mut md = base.clone();
        let block = constant_block(&mut md);
        let i = rng.random_range(0..block.entries.len());
        block.entries[i].offset += 4;
        assert_ne!(md.compute_hash(), hash, "offset change, iteration {tag}");

        // array size
        let mut md = base.clone();
        let block = constant_block(&mut md);
        let i = rng.random_range(0..block.entries.len());
        block.entries[i].array_size += 1;
        assert_ne!(md.compute_hash(), hash, "array size change, iteration {tag}");

        // data type
        let mut md = base.clone();
        let (_, primvar) = md.element_data.iter_mut().next().unwrap();
        primvar.data_type = interner::intern(if interner::resolve(primvar.data_type) == "ivec4" {
            "uvec4"
        } else {
            "ivec4"
        });
        assert_ne!(md.compute_hash(), hash, "type change, iteration {tag}");

        // removed channel
        let mut md = base.clone();
        let key = *md.element_data.keys().last().unwrap();
        md.element_data.remove(&key);
        assert_ne!(md.compute_hash(), hash, "removed channel, iteration {tag}");

        // added channel
        let mut md = base.clone();
        md.fvar_data.insert(
            Binding::new(StorageClass::StorageBlock, 1000, 0),
            PrimVar::new("st", "vec2"),
        );
        assert_ne!(md.compute_hash(), hash, "added channel, iteration {tag}");

        // same channel filed under another category
        let mut md = base.clone();
        let (binding, primvar) = md.element_data.pop_first().unwrap();
        md.fvar_data.insert(binding, primvar);
        assert_ne!(md.compute_hash(), hash, "category move, iteration {tag}");
    }
}

#[test]
fn random_plans_do_not_collide() {
    let mut rng = StdRng::seed_from_u64(1234);
    let mut seen = std::collections::HashSet::new();
    for tag in 0..ITERATIONS {
        assert!(seen.insert(random_metadata(&mut rng, tag).compute_hash()));
    }
}

// ============================================================================
// Allocator
// ============================================================================

#[test]
fn allocator_locations_strictly_increase() {
    let classes = [
        StorageClass::Uniform,
        StorageClass::UniformBlock,
        StorageClass::StorageBlock,
        StorageClass::VertexAttr,
        StorageClass::TextureBuffer,
        StorageClass::Texture2D,
        StorageClass::BindlessTexture2D,
    ];
    let mut rng = StdRng::seed_from_u64(99);
    let mut alloc = BindingAllocator::new(5);
    let mut last: Vec<Option<u32>> = vec![None; classes.len()];
    let mut last_unit = 4;

    for _ in 0..500 {
        let i = rng.random_range(0..classes.len());
        let binding = alloc.allocate(classes[i], "channel");
        assert_eq!(binding.class(), classes[i]);
        if let Some(previous) = last[i] {
            assert!(binding.location() > previous);
        }
        last[i] = Some(binding.location());

        if matches!(classes[i], StorageClass::TextureBuffer | StorageClass::Texture2D) {
            assert_eq!(binding.texture_unit(), last_unit + 1);
            last_unit = binding.texture_unit();
        }
    }
    assert!(alloc.errors().is_empty());
}

// ============================================================================
// Resolution
// ============================================================================

fn random_draw_item(rng: &mut StdRng) -> DrawItem {
    let mut vertex = BufferArrayRange::new();
    for i in 0..rng.random_range(1..=8usize) {
        vertex.add_resource(&format!("attr{i}"), BufferResource::new(random_type(rng), 4, 0));
    }
    let mut constant = BufferArrayRange::new();
    for i in 0..rng.random_range(1..=8usize) {
        constant.add_resource(
            &format!("const{i}"),
            BufferResource::new(random_type(rng), 4, (i * 64) as u32),
        );
    }
    let mut draw_item = DrawItem::new().with_vertex(vertex).with_constant(constant);
    for level in 0..rng.random_range(0..3usize) {
        draw_item = draw_item.with_instance_level(Some(
            BufferArrayRange::new().with_resource(&format!("inst{level}"), BufferResource::new("vec4", 4, 0)),
        ));
    }
    draw_item
}

#[test]
fn resolve_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(5);
    let all_flags = [
        CapabilityFlags::empty(),
        CapabilityFlags::STORAGE_BUFFER,
        CapabilityFlags::BINDLESS_BUFFER | CapabilityFlags::BINDLESS_TEXTURE,
        CapabilityFlags::all(),
    ];

    for _ in 0..50 {
        let draw_item = random_draw_item(&mut rng);
        let caps = RenderCaps::new(450, all_flags[rng.random_range(0..all_flags.len())]);
        let mode = DrawMode {
            indirect: rng.random_range(0..2) == 1,
            instanced: rng.random_range(0..2) == 1,
        };

        let mut binder = ResourceBinder::new(5);
        let first = binder.resolve_bindings(&caps, &draw_item, &[], &[], mode);
        let second = binder.resolve_bindings(&caps, &draw_item, &[], &[], mode);
        let fresh = ResourceBinder::new(5).resolve_bindings(&caps, &draw_item, &[], &[], mode);

        assert_eq!(first.compute_hash(), second.compute_hash());
        assert_eq!(first, fresh);
        assert!(binder.coding_errors().is_empty());
    }
}
