//! 预处理层注册表
//!
//! 训练图中包含 RandomFlip、RandomRotation 等数据增强层。推理时它们只是
//! 图结构的一部分，不执行任何随机变换。注册表把清单里的 `class_name`
//! 映射到具体的构造函数，遇到未知名称直接报错。

use crate::models::manifest::Interpolation;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::Array4;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 清单中的单个层描述，与 Keras 序列化格式一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub class_name: String,

    #[serde(default)]
    pub config: serde_json::Value,
}

impl LayerSpec {
    pub fn new(class_name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            class_name: class_name.into(),
            config,
        }
    }

    /// Keras 配置中的层名称（可选）
    pub fn layer_name(&self) -> Option<&str> {
        self.config.get("name").and_then(|v| v.as_str())
    }

    fn parse_config<T: DeserializeOwned>(&self) -> Result<T> {
        let config = if self.config.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            self.config.clone()
        };

        serde_json::from_value(config).map_err(|e| {
            ClassifyError::ModelLoad(format!("Invalid config for layer '{}': {}", self.class_name, e))
        })
    }
}

/// 推理图中的预处理层
pub trait PreprocessingLayer: Send + Sync + fmt::Debug {
    fn class_name(&self) -> &'static str;

    /// 层参数的简短描述
    fn summary(&self) -> String;

    /// 推理模式前向计算。数据增强层在推理模式下是恒等变换。
    fn call(&self, batch: Array4<f32>) -> Array4<f32> {
        batch
    }
}

pub type LayerConstructor = fn(&LayerSpec) -> Result<Box<dyn PreprocessingLayer>>;

pub struct LayerRegistry {
    constructors: BTreeMap<&'static str, LayerConstructor>,
}

impl LayerRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// 训练图中使用的五种数据增强层
    pub fn with_augmentation_layers() -> Self {
        let mut registry = Self::empty();
        registry.register("RandomHeight", RandomHeight::construct);
        registry.register("RandomWidth", RandomWidth::construct);
        registry.register("RandomFlip", RandomFlip::construct);
        registry.register("RandomZoom", RandomZoom::construct);
        registry.register("RandomRotation", RandomRotation::construct);
        registry
    }

    pub fn register(&mut self, class_name: &'static str, constructor: LayerConstructor) {
        if self.constructors.insert(class_name, constructor).is_some() {
            tracing::warn!("Layer constructor for '{}' replaced", class_name);
        }
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn resolve(&self, spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        let constructor = self.constructors.get(spec.class_name.as_str()).ok_or_else(|| {
            ClassifyError::ModelLoad(format!(
                "Unknown layer '{}' in model graph. Registered layers: {:?}",
                spec.class_name,
                self.names()
            ))
        })?;

        constructor(spec)
    }

    pub fn resolve_all(&self, specs: &[LayerSpec]) -> Result<Vec<Box<dyn PreprocessingLayer>>> {
        specs
            .iter()
            .map(|spec| {
                let layer = self.resolve(spec)?;
                tracing::debug!(
                    "Resolved layer {} ({})",
                    layer.summary(),
                    spec.layer_name().unwrap_or("unnamed")
                );
                Ok(layer)
            })
            .collect()
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::with_augmentation_layers()
    }
}

/// 随机因子：单个数值 `f` 表示 `[-f, f]`，二元组表示 `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum FactorSpec {
    Single(f32),
    Range([f32; 2]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor {
    pub lower: f32,
    pub upper: f32,
}

impl Factor {
    fn from_spec(spec: FactorSpec, layer: &str, min_lower: Option<f32>) -> Result<Self> {
        let (lower, upper) = match spec {
            FactorSpec::Single(f) => (-f.abs(), f.abs()),
            FactorSpec::Range([lower, upper]) => (lower, upper),
        };

        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(ClassifyError::ModelLoad(format!(
                "{}: invalid factor range [{}, {}]",
                layer, lower, upper
            )));
        }

        if let Some(min) = min_lower {
            if lower <= min {
                return Err(ClassifyError::ModelLoad(format!(
                    "{}: factor lower bound must be greater than {}, got {}",
                    layer, min, lower
                )));
            }
        }

        Ok(Self { lower, upper })
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Reflect,
    Wrap,
    Constant,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipMode {
    Horizontal,
    Vertical,
    #[default]
    HorizontalAndVertical,
}

fn default_bilinear() -> Interpolation {
    Interpolation::Bilinear
}

#[derive(Debug)]
pub struct RandomFlip {
    pub mode: FlipMode,
}

impl RandomFlip {
    fn construct(spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        #[derive(Deserialize)]
        struct Cfg {
            #[serde(default)]
            mode: FlipMode,
        }

        let cfg: Cfg = spec.parse_config()?;
        Ok(Box::new(Self { mode: cfg.mode }))
    }
}

impl PreprocessingLayer for RandomFlip {
    fn class_name(&self) -> &'static str {
        "RandomFlip"
    }

    fn summary(&self) -> String {
        format!("RandomFlip(mode={:?})", self.mode)
    }
}

#[derive(Debug)]
pub struct RandomRotation {
    pub factor: Factor,
    pub fill_mode: FillMode,
    pub interpolation: Interpolation,
}

impl RandomRotation {
    fn construct(spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        #[derive(Deserialize)]
        struct Cfg {
            factor: FactorSpec,
            #[serde(default)]
            fill_mode: FillMode,
            #[serde(default = "default_bilinear")]
            interpolation: Interpolation,
        }

        let cfg: Cfg = spec.parse_config()?;
        Ok(Box::new(Self {
            factor: Factor::from_spec(cfg.factor, "RandomRotation", None)?,
            fill_mode: cfg.fill_mode,
            interpolation: cfg.interpolation,
        }))
    }
}

impl PreprocessingLayer for RandomRotation {
    fn class_name(&self) -> &'static str {
        "RandomRotation"
    }

    fn summary(&self) -> String {
        format!("RandomRotation(factor={}, fill_mode={:?})", self.factor, self.fill_mode)
    }
}

#[derive(Debug)]
pub struct RandomZoom {
    pub height_factor: Factor,
    pub width_factor: Option<Factor>,
    pub fill_mode: FillMode,
    pub interpolation: Interpolation,
}

impl RandomZoom {
    fn construct(spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        #[derive(Deserialize)]
        struct Cfg {
            height_factor: FactorSpec,
            #[serde(default)]
            width_factor: Option<FactorSpec>,
            #[serde(default)]
            fill_mode: FillMode,
            #[serde(default = "default_bilinear")]
            interpolation: Interpolation,
        }

        let cfg: Cfg = spec.parse_config()?;
        let width_factor = cfg
            .width_factor
            .map(|f| Factor::from_spec(f, "RandomZoom", Some(-1.0)))
            .transpose()?;

        Ok(Box::new(Self {
            height_factor: Factor::from_spec(cfg.height_factor, "RandomZoom", Some(-1.0))?,
            width_factor,
            fill_mode: cfg.fill_mode,
            interpolation: cfg.interpolation,
        }))
    }
}

impl PreprocessingLayer for RandomZoom {
    fn class_name(&self) -> &'static str {
        "RandomZoom"
    }

    fn summary(&self) -> String {
        match self.width_factor {
            Some(width) => format!("RandomZoom(height={}, width={})", self.height_factor, width),
            None => format!("RandomZoom(height={})", self.height_factor),
        }
    }
}

#[derive(Debug)]
pub struct RandomHeight {
    pub factor: Factor,
    pub interpolation: Interpolation,
}

impl RandomHeight {
    fn construct(spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        let (factor, interpolation) = parse_resize_factor(spec, "RandomHeight")?;
        Ok(Box::new(Self {
            factor,
            interpolation,
        }))
    }
}

impl PreprocessingLayer for RandomHeight {
    fn class_name(&self) -> &'static str {
        "RandomHeight"
    }

    fn summary(&self) -> String {
        format!("RandomHeight(factor={})", self.factor)
    }
}

#[derive(Debug)]
pub struct RandomWidth {
    pub factor: Factor,
    pub interpolation: Interpolation,
}

impl RandomWidth {
    fn construct(spec: &LayerSpec) -> Result<Box<dyn PreprocessingLayer>> {
        let (factor, interpolation) = parse_resize_factor(spec, "RandomWidth")?;
        Ok(Box::new(Self {
            factor,
            interpolation,
        }))
    }
}

impl PreprocessingLayer for RandomWidth {
    fn class_name(&self) -> &'static str {
        "RandomWidth"
    }

    fn summary(&self) -> String {
        format!("RandomWidth(factor={})", self.factor)
    }
}

fn parse_resize_factor(spec: &LayerSpec, layer: &str) -> Result<(Factor, Interpolation)> {
    #[derive(Deserialize)]
    struct Cfg {
        factor: FactorSpec,
        #[serde(default = "default_bilinear")]
        interpolation: Interpolation,
    }

    let cfg: Cfg = spec.parse_config()?;
    Ok((Factor::from_spec(cfg.factor, layer, Some(-1.0))?, cfg.interpolation))
}
