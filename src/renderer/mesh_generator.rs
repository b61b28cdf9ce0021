use glam::{Vec2, Vec3, Vec4};

use crate::error::{BufferKind, GeneratorError};
use crate::settings::MeshSettings;
use crate::skeleton::{Attachment, Clipper, ConvexClipper, Skeleton, QUAD_TRIANGLES};

use super::bounds::MeshBounds;
use super::buffer::GrowableBuffer;
use super::color::{pack_rgba, VertexColor};
use super::instruction::{InstructionHistory, RendererInstruction, SubmeshInstruction};
use super::instruction_builder::InstructionBuilder;
use super::tangents::TangentSolver;
use super::triangles::TriangleIndexer;

/// Destination for generated vertices.
///
/// `reserve_vertices` is called with the total number of vertices the sink
/// must hold before each attachment is written; `write_vertex` then receives
/// indices below that total.
pub trait VertexSink {
    fn reserve_vertices(&mut self, vertex_count: usize) -> Result<(), GeneratorError>;

    fn write_vertex(&mut self, index: usize, position: Vec3, uv: Vec2, color: &VertexColor);
}

/// Color layout of a caller-owned buffer.
pub enum ColorTarget<'a> {
    Float(&'a mut [Vec4]),
    /// See [`pack_rgba`] for the byte order.
    Packed(&'a mut [u32]),
}

impl ColorTarget<'_> {
    fn len(&self) -> usize {
        match self {
            ColorTarget::Float(colors) => colors.len(),
            ColorTarget::Packed(colors) => colors.len(),
        }
    }
}

/// Caller-owned vertex storage. Written, never read; each slice must be at
/// least as long as the vertex count being built.
pub struct VertexBuffers<'a> {
    pub positions: &'a mut [Vec3],
    pub uvs: &'a mut [Vec2],
    pub colors: ColorTarget<'a>,
}

impl VertexSink for VertexBuffers<'_> {
    fn reserve_vertices(&mut self, vertex_count: usize) -> Result<(), GeneratorError> {
        let lengths = [
            (BufferKind::Positions, self.positions.len()),
            (BufferKind::Uvs, self.uvs.len()),
            (BufferKind::Colors, self.colors.len()),
        ];
        for (buffer, available) in lengths {
            if available < vertex_count {
                return Err(GeneratorError::BufferTooSmall {
                    buffer,
                    required: vertex_count,
                    available,
                });
            }
        }
        Ok(())
    }

    fn write_vertex(&mut self, index: usize, position: Vec3, uv: Vec2, color: &VertexColor) {
        self.positions[index] = position;
        self.uvs[index] = uv;
        match &mut self.colors {
            ColorTarget::Float(colors) => colors[index] = color.rgba,
            ColorTarget::Packed(colors) => colors[index] = color.packed(),
        }
    }
}

#[derive(Debug)]
struct SharedBuffers {
    positions: GrowableBuffer<Vec3>,
    uvs: GrowableBuffer<Vec2>,
    colors: GrowableBuffer<Vec4>,
    uv2: GrowableBuffer<Vec2>,
    uv3: GrowableBuffer<Vec2>,
    tint_black: bool,
}

impl SharedBuffers {
    fn new() -> Self {
        Self {
            positions: GrowableBuffer::new("vertex"),
            uvs: GrowableBuffer::new("uv"),
            colors: GrowableBuffer::new("color"),
            uv2: GrowableBuffer::new("uv2"),
            uv3: GrowableBuffer::new("uv3"),
            tint_black: false,
        }
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.colors.clear();
        self.uv2.clear();
        self.uv3.clear();
    }
}

impl VertexSink for SharedBuffers {
    fn reserve_vertices(&mut self, vertex_count: usize) -> Result<(), GeneratorError> {
        self.positions.resize_without_init(vertex_count);
        self.uvs.resize_without_init(vertex_count);
        self.colors.resize_without_init(vertex_count);
        if self.tint_black {
            self.uv2.resize_without_init(vertex_count);
            self.uv3.resize_without_init(vertex_count);
        }
        Ok(())
    }

    fn write_vertex(&mut self, index: usize, position: Vec3, uv: Vec2, color: &VertexColor) {
        self.positions.as_mut_slice()[index] = position;
        self.uvs.as_mut_slice()[index] = uv;
        self.colors.as_mut_slice()[index] = color.rgba;
        if let (true, Some(tint)) = (self.tint_black, color.tint_black) {
            self.uv2.as_mut_slice()[index] = tint.rg;
            self.uv3.as_mut_slice()[index] = tint.ba;
        }
    }
}

/// Generator state borrowed for one submesh write.
struct Emitter<'a, C> {
    settings: &'a MeshSettings,
    clipper: &'a mut C,
    world: &'a mut Vec<Vec2>,
    bounds: &'a mut MeshBounds,
}

impl<C: Clipper> Emitter<'_, C> {
    /// Writes one batch into `sink` starting at vertex `first_vertex`.
    /// Returns the number of vertices written.
    fn emit<S: VertexSink>(
        &mut self,
        skeleton: &Skeleton,
        submesh: &SubmeshInstruction,
        sink: &mut S,
        first_vertex: usize,
        mut triangles: Option<&mut TriangleIndexer>,
        submesh_index: usize,
    ) -> Result<usize, GeneratorError> {
        let use_clipping = self.settings.use_clipping && submesh.has_clipping;
        if use_clipping {
            self.restart_clip(skeleton, submesh);
        }
        if let Some(indexer) = triangles.as_deref_mut() {
            indexer.begin_submesh(submesh_index);
        }

        let written = self.emit_slots(
            skeleton,
            submesh,
            use_clipping,
            sink,
            first_vertex,
            triangles.as_deref_mut(),
            submesh_index,
        );

        self.clipper.clip_end();
        if let Some(indexer) = triangles {
            indexer.end_submesh(submesh_index);
        }
        self.bounds.thickness = submesh.end_slot as f32 * self.settings.z_spacing;
        written
    }

    fn restart_clip(&mut self, skeleton: &Skeleton, submesh: &SubmeshInstruction) {
        let Some(slot) = submesh
            .pre_active_clipping_slot_source
            .and_then(|source| skeleton.drawn_slot(source))
        else {
            return;
        };
        if let Some(Attachment::Clipping(clip)) = skeleton.slot_attachment(slot) {
            self.clipper.clip_start(slot, clip);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_slots<S: VertexSink>(
        &mut self,
        skeleton: &Skeleton,
        submesh: &SubmeshInstruction,
        use_clipping: bool,
        sink: &mut S,
        first_vertex: usize,
        mut triangles: Option<&mut TriangleIndexer>,
        submesh_index: usize,
    ) -> Result<usize, GeneratorError> {
        let settings = self.settings;
        let mut cursor = first_vertex;

        for index in submesh.start_slot..submesh.end_slot {
            let Some(slot) = skeleton.drawn_slot(index) else {
                continue;
            };
            if !slot.bone_active {
                self.clipper.clip_end_slot(slot);
                continue;
            }

            let (uvs, source_triangles, attachment_color): (&[Vec2], &[u16], Vec4) =
                match skeleton.slot_attachment(slot) {
                    Some(Attachment::Region(region)) => {
                        region.compute_world_vertices(&slot.bone_transform, self.world);
                        (&region.uvs[..], &QUAD_TRIANGLES[..], region.color)
                    }
                    Some(Attachment::Mesh(mesh)) if mesh.is_drawable() => {
                        mesh.compute_world_vertices(&slot.bone_transform, self.world);
                        (&mesh.uvs[..], &mesh.triangles[..], mesh.color)
                    }
                    Some(Attachment::Clipping(clip)) => {
                        if use_clipping {
                            self.clipper.clip_start(slot, clip);
                        }
                        continue;
                    }
                    _ => {
                        self.clipper.clip_end_slot(slot);
                        continue;
                    }
                };

            let color = VertexColor::resolve(skeleton.color, slot, attachment_color, settings);

            let (positions, uvs, source_triangles) = if use_clipping && self.clipper.is_clipping()
            {
                self.clipper.clip_triangles(&self.world[..], source_triangles, uvs);
                (
                    self.clipper.clipped_vertices(),
                    self.clipper.clipped_uvs(),
                    self.clipper.clipped_triangles(),
                )
            } else {
                (&self.world[..], uvs, source_triangles)
            };

            let vertex_count = positions.len().min(uvs.len());
            if vertex_count > 0 && !source_triangles.is_empty() {
                sink.reserve_vertices(cursor + vertex_count)?;

                let z = settings.z_spacing * index as f32;
                for (offset, (&position, &uv)) in positions.iter().zip(uvs).enumerate() {
                    sink.write_vertex(cursor + offset, position.extend(z), uv, &color);
                    self.bounds.include(position);
                }

                if let Some(indexer) = triangles.as_deref_mut() {
                    indexer.append(submesh_index, source_triangles, cursor);
                }
                cursor += vertex_count;
            }

            self.clipper.clip_end_slot(slot);
        }

        Ok(cursor - first_vertex)
    }
}

/// Turns batch instructions into vertex, UV, color and triangle data.
///
/// The generator owns growable buffers that persist across frames, the
/// previous/current instruction pair used for change detection, and the
/// clipper fed while clip regions are open.
pub struct MeshGenerator<C: Clipper = ConvexClipper> {
    settings: MeshSettings,
    clipper: C,
    shared: SharedBuffers,
    normals: GrowableBuffer<Vec3>,
    tangents: GrowableBuffer<Vec4>,
    tangent_solver: TangentSolver,
    triangles: TriangleIndexer,
    submesh_index: usize,
    bounds: MeshBounds,
    world: Vec<Vec2>,
    history: InstructionHistory,
}

impl MeshGenerator<ConvexClipper> {
    pub fn new(settings: MeshSettings) -> Self {
        Self::with_clipper(settings, ConvexClipper::new())
    }
}

impl Default for MeshGenerator<ConvexClipper> {
    fn default() -> Self {
        Self::new(MeshSettings::default())
    }
}

impl<C: Clipper> MeshGenerator<C> {
    pub fn with_clipper(settings: MeshSettings, clipper: C) -> Self {
        Self {
            settings,
            clipper,
            shared: SharedBuffers::new(),
            normals: GrowableBuffer::new("normal"),
            tangents: GrowableBuffer::new("tangent"),
            tangent_solver: TangentSolver::new(),
            triangles: TriangleIndexer::new(),
            submesh_index: 0,
            bounds: MeshBounds::EMPTY,
            world: Vec::new(),
            history: InstructionHistory::new(),
        }
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: MeshSettings) {
        self.settings = settings;
    }

    pub fn clipper(&self) -> &C {
        &self.clipper
    }

    /// Builds this frame's instruction. Returns `true` when its topology
    /// differs from last frame's and triangles must be regenerated.
    pub fn prepare(&mut self, builder: &InstructionBuilder, skeleton: &Skeleton) -> bool {
        builder.build(skeleton, self.history.advance());
        self.apply_settings_to_instruction();
        self.history.has_changed()
    }

    /// Like [`prepare`](Self::prepare) with a single batch for the whole
    /// skeleton.
    pub fn prepare_single(&mut self, builder: &InstructionBuilder, skeleton: &Skeleton) -> bool {
        builder.build_single(skeleton, self.history.advance());
        self.apply_settings_to_instruction();
        self.history.has_changed()
    }

    fn apply_settings_to_instruction(&mut self) {
        self.history.current_mut().immutable_triangles |= self.settings.immutable_triangles;
    }

    pub fn instruction(&self) -> &RendererInstruction {
        self.history.current()
    }

    pub fn history(&self) -> &InstructionHistory {
        &self.history
    }

    /// Builds the prepared instruction into the shared buffers, then fills
    /// normals and tangents as configured.
    pub fn generate(&mut self, skeleton: &Skeleton, update_triangles: bool) {
        let instruction = std::mem::take(self.history.current_mut());
        self.begin();
        self.build_mesh(skeleton, &instruction, update_triangles);
        self.fill_late_vertex_data();
        *self.history.current_mut() = instruction;
    }

    /// Starts a build cycle: empties the shared buffers and resets bounds.
    pub fn begin(&mut self) {
        self.shared.clear();
        self.shared.tint_black = self.settings.tint_black;
        self.submesh_index = 0;
        self.bounds.reset();
    }

    /// Appends every batch of `instruction` to the shared buffers.
    pub fn build_mesh(
        &mut self,
        skeleton: &Skeleton,
        instruction: &RendererInstruction,
        update_triangles: bool,
    ) {
        for submesh in &instruction.submeshes {
            self.add_submesh(skeleton, submesh, update_triangles);
        }
    }

    /// Appends one batch to the shared buffers as the next submesh.
    pub fn add_submesh(
        &mut self,
        skeleton: &Skeleton,
        submesh: &SubmeshInstruction,
        update_triangles: bool,
    ) {
        let first_vertex = self.shared.positions.len();
        let index = self.submesh_index;
        let mut emitter = Emitter {
            settings: &self.settings,
            clipper: &mut self.clipper,
            world: &mut self.world,
            bounds: &mut self.bounds,
        };
        let triangles = update_triangles.then_some(&mut self.triangles);

        if let Err(err) = emitter.emit(
            skeleton,
            submesh,
            &mut self.shared,
            first_vertex,
            triangles,
            index,
        ) {
            log::error!("Failed to write submesh {}: {}", index, err);
        }

        self.submesh_index += 1;
        self.triangles.set_submesh_count(self.submesh_index);
    }

    /// Builds every batch into caller-owned storage. Triangles stay in the
    /// generator; fetch them with [`copy_triangles_into`](Self::copy_triangles_into).
    pub fn build_mesh_into<S: VertexSink>(
        &mut self,
        skeleton: &Skeleton,
        instruction: &RendererInstruction,
        update_triangles: bool,
        sink: &mut S,
    ) -> Result<usize, GeneratorError> {
        let clipped = self.settings.use_clipping && instruction.has_active_clipping;
        if !clipped {
            sink.reserve_vertices(instruction.raw_vertex_count)?;
        }

        self.bounds.reset();
        let mut emitter = Emitter {
            settings: &self.settings,
            clipper: &mut self.clipper,
            world: &mut self.world,
            bounds: &mut self.bounds,
        };
        let mut triangles = update_triangles.then_some(&mut self.triangles);

        let mut vertex_count = 0;
        for (index, submesh) in instruction.submeshes.iter().enumerate() {
            let written = emitter.emit(
                skeleton,
                submesh,
                &mut *sink,
                vertex_count,
                triangles.as_deref_mut(),
                index,
            );
            match written {
                Ok(written) => vertex_count += written,
                Err(err) => {
                    // Partially rewritten lists must not be reported as valid.
                    if update_triangles {
                        self.triangles.set_submesh_count(0);
                    }
                    return Err(err);
                }
            }
        }

        self.triangles.set_submesh_count(instruction.submeshes.len());
        Ok(vertex_count)
    }

    /// Builds only batch `submesh_index` into caller-owned storage, with
    /// vertices and triangle indices relative to that batch.
    pub fn build_submesh_into<S: VertexSink>(
        &mut self,
        skeleton: &Skeleton,
        instruction: &RendererInstruction,
        submesh_index: usize,
        update_triangles: bool,
        sink: &mut S,
    ) -> Result<usize, GeneratorError> {
        let submesh = instruction.submeshes.get(submesh_index).ok_or(
            GeneratorError::SubmeshOutOfRange {
                index: submesh_index,
                count: instruction.submeshes.len(),
            },
        )?;

        if !(self.settings.use_clipping && submesh.has_clipping) {
            sink.reserve_vertices(submesh.raw_vertex_count)?;
        }

        self.bounds.reset();
        let mut emitter = Emitter {
            settings: &self.settings,
            clipper: &mut self.clipper,
            world: &mut self.world,
            bounds: &mut self.bounds,
        };
        let triangles = update_triangles.then_some(&mut self.triangles);
        let written = match emitter.emit(skeleton, submesh, sink, 0, triangles, submesh_index) {
            Ok(written) => written,
            Err(err) => {
                if update_triangles {
                    let count = self.triangles.submesh_count().min(submesh_index);
                    self.triangles.set_submesh_count(count);
                }
                return Err(err);
            }
        };

        let count = self.triangles.submesh_count().max(submesh_index + 1);
        self.triangles.set_submesh_count(count);
        Ok(written)
    }

    /// Fills normals and tangents for the shared buffers as configured.
    pub fn fill_late_vertex_data(&mut self) {
        let vertex_count = self.shared.positions.len();

        if self.settings.add_normals {
            self.normals.resize_without_init(vertex_count);
            self.normals.as_mut_slice().fill(Vec3::NEG_Z);
        }

        if self.settings.calculate_tangents {
            self.tangents.resize_without_init(vertex_count);
            self.tangent_solver.solve(
                self.shared.positions.as_slice(),
                self.shared.uvs.as_slice(),
                self.triangles.submeshes(),
                self.tangents.as_mut_slice(),
            );
        }
    }

    /// Tangents for geometry built with
    /// [`build_mesh_into`](Self::build_mesh_into).
    pub fn fill_tangents_into(
        &mut self,
        positions: &[Vec3],
        uvs: &[Vec2],
        tangents: &mut [Vec4],
    ) -> Result<(), GeneratorError> {
        check_tangent_capacity(positions.len(), tangents.len())?;
        self.tangent_solver
            .solve(positions, uvs, self.triangles.submeshes(), tangents);
        Ok(())
    }

    /// Tangents for one batch built with
    /// [`build_submesh_into`](Self::build_submesh_into).
    pub fn fill_submesh_tangents_into(
        &mut self,
        submesh_index: usize,
        positions: &[Vec3],
        uvs: &[Vec2],
        tangents: &mut [Vec4],
    ) -> Result<(), GeneratorError> {
        let triangles =
            self.triangles
                .submesh(submesh_index)
                .ok_or(GeneratorError::SubmeshOutOfRange {
                    index: submesh_index,
                    count: self.triangles.submesh_count(),
                })?;
        check_tangent_capacity(positions.len(), tangents.len())?;
        self.tangent_solver.solve(positions, uvs, [triangles], tangents);
        Ok(())
    }

    /// Scales shared positions, bounds and thickness, e.g. to convert
    /// skeleton units to pixels.
    pub fn scale_vertex_data(&mut self, scale: f32) {
        for position in self.shared.positions.as_mut_slice() {
            *position *= scale;
        }
        self.bounds.scale(scale);
    }

    /// [`scale_vertex_data`](Self::scale_vertex_data) for caller-owned
    /// positions.
    pub fn scale_vertex_data_in(&mut self, positions: &mut [Vec3], scale: f32) {
        for position in positions {
            *position *= scale;
        }
        self.bounds.scale(scale);
    }

    pub fn vertex_count(&self) -> usize {
        self.shared.positions.len()
    }

    pub fn vertex_buffer(&self) -> &[Vec3] {
        self.shared.positions.as_slice()
    }

    pub fn uv_buffer(&self) -> &[Vec2] {
        self.shared.uvs.as_slice()
    }

    pub fn color_buffer(&self) -> &[Vec4] {
        self.shared.colors.as_slice()
    }

    pub fn packed_color_buffer(&self) -> Vec<u32> {
        self.color_buffer().iter().copied().map(pack_rgba).collect()
    }

    pub fn copy_packed_colors_into(&self, dst: &mut [u32]) -> Result<usize, GeneratorError> {
        let colors = self.color_buffer();
        if dst.len() < colors.len() {
            return Err(GeneratorError::BufferTooSmall {
                buffer: BufferKind::Colors,
                required: colors.len(),
                available: dst.len(),
            });
        }
        for (dst, &color) in dst.iter_mut().zip(colors) {
            *dst = pack_rgba(color);
        }
        Ok(colors.len())
    }

    /// `uv2` and `uv3` channels when tint black is enabled.
    pub fn tint_black_buffers(&self) -> Option<(&[Vec2], &[Vec2])> {
        self.shared
            .tint_black
            .then(|| (self.shared.uv2.as_slice(), self.shared.uv3.as_slice()))
    }

    pub fn normal_buffer(&self) -> &[Vec3] {
        self.normals.as_slice()
    }

    pub fn tangent_buffer(&self) -> &[Vec4] {
        self.tangents.as_slice()
    }

    pub fn submesh_count(&self) -> usize {
        self.triangles.submesh_count()
    }

    pub fn submesh_triangles(&self, index: usize) -> Option<&[u32]> {
        self.triangles.submesh(index)
    }

    pub fn submesh_sizes(&self) -> Vec<usize> {
        self.triangles.sizes()
    }

    pub fn copy_triangles_into(&self, dst: &mut [u32]) -> Result<usize, GeneratorError> {
        self.triangles.copy_into(dst)
    }

    pub fn bounds(&self) -> MeshBounds {
        self.bounds
    }
}

fn check_tangent_capacity(vertex_count: usize, available: usize) -> Result<(), GeneratorError> {
    if available < vertex_count {
        return Err(GeneratorError::BufferTooSmall {
            buffer: BufferKind::Tangents,
            required: vertex_count,
            available,
        });
    }
    Ok(())
}
