//! Feature graph: declared extractors compiled into a frame schema.
//!
//! A [`SchemaBuilder`] collects ordered `(name, extractor, store, indexed)`
//! entries. [`SchemaBuilder::compile`] validates every dependency name,
//! proves the dependency relation acyclic, and fixes a deterministic
//! topological execution order (ties broken by declaration order). The
//! resulting [`FrameSchema`] is immutable and doubles as the persistent
//! store's column schema.
//!
//! Execution windows incoming audio per the configuration and evaluates
//! extractors strictly in the compiled order, checking every output
//! against its declared shape/dtype contract.

pub mod extractors;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::graph::DiGraph;

use crate::array::{ArrayData, DType, DimArray};
use crate::config::AudioConfig;
use crate::dimension::Dimension;
use crate::error::{AudiolithResult, GraphError};

/// The capability interface a concrete feature algorithm must satisfy.
///
/// The core depends only on this trait, never on a concrete extractor.
pub trait Extractor: Send + Sync {
    /// Output shape per analysis frame, as a function of the active
    /// configuration. An empty shape declares a scalar feature.
    fn dim(&self, config: &AudioConfig) -> Vec<usize>;

    /// Output element type.
    fn dtype(&self) -> DType;

    /// Axis dimensions of the per-frame output, used to reconstruct
    /// dimension metadata on read. Defaults to positional axes.
    fn feature_dims(&self, config: &AudioConfig) -> Vec<Dimension> {
        self.dim(config).iter().map(|_| Dimension::Identity).collect()
    }

    /// Compute one output from the freshly computed outputs of the
    /// declared dependencies. Extractors with no dependencies receive the
    /// raw audio window as their single input.
    fn process(&self, inputs: &[&DimArray]) -> AudiolithResult<DimArray> {
        let _ = inputs;
        Err(GraphError::NotImplemented.into())
    }
}

/// One compiled node of the feature graph.
pub struct FeatureNode {
    pub name: String,
    pub needs: Vec<String>,
    pub store: bool,
    pub indexed: bool,
    extractor: Arc<dyn Extractor>,
}

impl FeatureNode {
    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }
}

impl std::fmt::Debug for FeatureNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureNode")
            .field("name", &self.name)
            .field("needs", &self.needs)
            .field("store", &self.store)
            .field("indexed", &self.indexed)
            .finish()
    }
}

/// Declarative schema builder: an ordered registry of feature entries.
pub struct SchemaBuilder {
    name: String,
    entries: Vec<FeatureNode>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Declare a feature. `needs` lists upstream feature names; an empty
    /// list makes this a root fed by the raw audio window.
    pub fn feature(
        mut self,
        name: impl Into<String>,
        extractor: impl Extractor + 'static,
        needs: &[&str],
        store: bool,
    ) -> Self {
        self.entries.push(FeatureNode {
            name: name.into(),
            needs: needs.iter().map(|s| (*s).to_string()).collect(),
            store,
            indexed: false,
            extractor: Arc::new(extractor),
        });
        self
    }

    /// Declare a stored feature whose column should also be indexed for
    /// equality/range lookup.
    pub fn indexed_feature(
        mut self,
        name: impl Into<String>,
        extractor: impl Extractor + 'static,
        needs: &[&str],
    ) -> Self {
        self.entries.push(FeatureNode {
            name: name.into(),
            needs: needs.iter().map(|s| (*s).to_string()).collect(),
            store: true,
            indexed: true,
            extractor: Arc::new(extractor),
        });
        self
    }

    /// Compile into an immutable [`FrameSchema`].
    ///
    /// Fails before any audio is processed: unknown dependency names and
    /// dependency cycles are compile-time errors.
    pub fn compile(self) -> AudiolithResult<FrameSchema> {
        let by_name: HashMap<String, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), i))
            .collect();

        for node in &self.entries {
            for dep in &node.needs {
                if !by_name.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        feature: node.name.clone(),
                        dependency: dep.clone(),
                    }
                    .into());
                }
            }
        }

        // Cycle detection via petgraph; the deterministic order below is
        // computed separately so declaration order breaks ties.
        let mut graph = DiGraph::<usize, ()>::new();
        let indices: Vec<_> = (0..self.entries.len()).map(|i| graph.add_node(i)).collect();
        for (i, node) in self.entries.iter().enumerate() {
            for dep in &node.needs {
                graph.add_edge(indices[by_name[dep]], indices[i], ());
            }
        }
        petgraph::algo::toposort(&graph, None).map_err(|cycle| {
            GraphError::CyclicDependency {
                feature: self.entries[graph[cycle.node_id()]].name.clone(),
            }
        })?;

        // Kahn's algorithm scanning declaration order, so the first
        // declared ready node always runs next.
        let mut emitted = vec![false; self.entries.len()];
        let mut order = Vec::with_capacity(self.entries.len());
        while order.len() < self.entries.len() {
            for (i, node) in self.entries.iter().enumerate() {
                if emitted[i] {
                    continue;
                }
                let ready = node.needs.iter().all(|dep| emitted[by_name[dep]]);
                if ready {
                    emitted[i] = true;
                    order.push(i);
                }
            }
        }

        let schema = FrameSchema {
            name: self.name,
            id: next_schema_id(),
            features: self.entries,
            by_name,
            order,
        };
        tracing::debug!(
            schema = %schema.name,
            id = schema.id,
            features = schema.features.len(),
            "compiled frame schema"
        );
        Ok(schema)
    }
}

static SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

fn next_schema_id() -> u64 {
    SCHEMA_ID.fetch_add(1, Ordering::Relaxed)
}

/// The compiled, immutable feature graph.
///
/// Two schemas are distinct even when structurally identical; the minted
/// `id` carries that identity for in-process store binding, while the
/// structural layout is what the persisted manifest records.
pub struct FrameSchema {
    name: String,
    id: u64,
    features: Vec<FeatureNode>,
    by_name: HashMap<String, usize>,
    order: Vec<usize>,
}

impl FrameSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique schema identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Features in declaration order.
    pub fn features(&self) -> &[FeatureNode] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureNode> {
        self.by_name.get(name).map(|&i| &self.features[i])
    }

    /// Feature names in compiled execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.features[i].name.as_str()).collect()
    }

    /// Features persisted as columns, in declaration order.
    pub fn stored_features(&self) -> impl Iterator<Item = &FeatureNode> {
        self.features.iter().filter(|node| node.store)
    }

    /// Run the graph over `audio`, producing one output array per feature
    /// shaped `(n_frames, *dim)` with a frame time axis.
    ///
    /// Audio is windowed per the configuration, zero-padding the trailing
    /// partial window. Every per-frame output is checked against its
    /// declared shape/dtype; a mismatch aborts the whole run with
    /// `ContractViolation` and no partial result.
    pub fn execute(
        &self,
        config: &AudioConfig,
        audio: &[f32],
    ) -> AudiolithResult<ExecutionResult> {
        let n_frames = config.frame_count(audio.len());
        let sample_dim = Dimension::Time(config.sample_time_dimension());
        let frame_dim = Dimension::Time(config.frame_time_dimension());

        let mut per_feature: Vec<Vec<DimArray>> =
            (0..self.features.len()).map(|_| Vec::with_capacity(n_frames)).collect();
        let mut windows = Vec::with_capacity(n_frames);

        for frame in 0..n_frames {
            let start = frame * config.step_size;
            let mut window = vec![0.0f32; config.window_size];
            let end = (start + config.window_size).min(audio.len());
            if start < end {
                window[..end - start].copy_from_slice(&audio[start..end]);
            }
            let window = DimArray::from_f32(window, sample_dim.clone());

            let mut outputs: Vec<Option<DimArray>> = (0..self.features.len()).map(|_| None).collect();
            for &i in &self.order {
                let node = &self.features[i];
                let deps: Vec<&DimArray> = if node.needs.is_empty() {
                    vec![&window]
                } else {
                    node.needs
                        .iter()
                        .map(|dep| {
                            outputs[self.by_name[dep]]
                                .as_ref()
                                .expect("topological order guarantees computed dependencies")
                        })
                        .collect()
                };
                let out = node.extractor.process(&deps)?;
                self.check_contract(node, config, &out)?;
                outputs[i] = Some(out);
            }
            for (i, out) in outputs.into_iter().enumerate() {
                // Every node ran; the compiled order covers all features.
                if let Some(out) = out {
                    per_feature[i].push(out);
                }
            }
            windows.push(window);
        }

        let mut features = Vec::with_capacity(self.features.len());
        for (node, frames) in self.features.iter().zip(per_feature) {
            let stacked = if frames.is_empty() {
                empty_feature_array(node, config, frame_dim.clone())?
            } else {
                // Per-frame outputs carry placeholder axes; the declared
                // feature dimensions are authoritative for the stack.
                let (data, shape, _) =
                    DimArray::stack(frame_dim.clone(), &frames)?.into_parts();
                let mut dims = vec![frame_dim.clone()];
                dims.extend(node.extractor.feature_dims(config));
                DimArray::new(data, shape, dims)?
            };
            features.push((node.name.clone(), stacked));
        }

        let audio_array = if windows.is_empty() {
            DimArray::new(
                ArrayData::F32(Vec::new()),
                vec![0, config.window_size],
                vec![frame_dim, sample_dim],
            )?
        } else {
            DimArray::stack(frame_dim, &windows)?
        };

        Ok(ExecutionResult {
            audio: audio_array,
            features,
        })
    }

    fn check_contract(
        &self,
        node: &FeatureNode,
        config: &AudioConfig,
        out: &DimArray,
    ) -> AudiolithResult<()> {
        let declared = node.extractor.dim(config);
        if out.shape() != declared.as_slice() || out.dtype() != node.extractor.dtype() {
            return Err(GraphError::ContractViolation {
                feature: node.name.clone(),
                expected: format!("{:?} {}", declared, node.extractor.dtype()),
                actual: format!("{:?} {}", out.shape(), out.dtype()),
            }
            .into());
        }
        Ok(())
    }

    /// Shape of a feature's stacked output after `n` frames.
    pub fn column_shape(&self, name: &str, config: &AudioConfig, n_frames: usize) -> Option<Vec<usize>> {
        let node = self.feature(name)?;
        let mut shape = vec![n_frames];
        shape.extend(node.extractor.dim(config));
        Some(shape)
    }
}

impl std::fmt::Debug for FrameSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSchema")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("features", &self.features)
            .finish()
    }
}

/// Zero-frame output matching a feature's declared shape and type.
fn empty_feature_array(
    node: &FeatureNode,
    config: &AudioConfig,
    frame_dim: Dimension,
) -> AudiolithResult<DimArray> {
    let per_frame = node.extractor.dim(config);
    let mut shape = vec![0];
    shape.extend_from_slice(&per_frame);
    let mut dims = vec![frame_dim];
    dims.extend(node.extractor.feature_dims(config));
    DimArray::new(ArrayData::zeros(node.extractor.dtype(), 0), shape, dims)
}

/// Output of one graph run: the windowed audio and every feature's
/// stacked array, in declaration order.
#[derive(Debug)]
pub struct ExecutionResult {
    pub audio: DimArray,
    pub features: Vec<(String, DimArray)>,
}

impl ExecutionResult {
    pub fn feature(&self, name: &str) -> Option<&DimArray> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arr)| arr)
    }
}
