//! Neural Network inference.

use crate::image::Image;
use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec,
    Tensor, TypedFact, TypedOp,
};

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    width: u32,
    height: u32,
    image_map: Arc<dyn Fn(&Image) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let (width, height) = Self::get_input_res(&nn, shape)?;
        let (h, w) = (height as usize, width as usize);

        // The image passed to the closure is always resampled to the input resolution first, so
        // pixel coordinates map 1:1 onto tensor coordinates.
        let image_map: Arc<dyn Fn(&Image) -> Tensor + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |image: &Image| {
                Tensor::from(Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                    color_mapper.map(image.get(x as u32, y as u32))[c]
                }))
            }),
            CnnInputShape::NHWC => Arc::new(move |image: &Image| {
                Tensor::from(Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                    color_mapper.map(image.get(x as u32, y as u32))[c]
                }))
            }),
        };

        Ok(Self {
            nn,
            width,
            height,
            image_map,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<(u32, u32)> {
        let inputs = nn.input_shapes()?;
        let [tensor_shape] = &*inputs else {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                inputs.len(),
            );
        };

        let (w, h) = match (shape, &**tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        Ok((w.try_into()?, h.try_into()?))
    }

    /// Returns the expected input image size as `(width, height)`.
    #[inline]
    pub fn input_resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// The input image will be resampled to create the network's input tensor. If the image's
    /// aspect ratio does not match the network's input aspect ratio, the image will be stretched.
    pub fn estimate(&self, image: &Image) -> anyhow::Result<Outputs> {
        let tensor = if (image.width(), image.height()) == (self.width, self.height) {
            (self.image_map)(image)
        } else {
            (self.image_map)(&image.resize(self.width, self.height))
        };

        self.nn.estimate(tensor)
    }
}

/// Maps 8-bit sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// The returned object can be passed directly to [`Cnn::new`] as its color map.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, [r, g, b, _]: [u8; 4]) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        [r, g, b].map(|col| col as f32 * adjust_range + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, often 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader.
pub struct Loader {
    model_data: Vec<u8>,
}

impl Loader {
    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Loader> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!("neural network file must have `.onnx` extension"),
        }

        let model_data = std::fs::read(path)?;
        Ok(Loader { model_data })
    }

    /// Returns the concrete shapes of all network inputs.
    pub fn input_shapes(&self) -> anyhow::Result<Vec<Vec<usize>>> {
        let model = self.0.model();
        (0..model.inputs.len())
            .map(|id| -> anyhow::Result<Vec<usize>> {
                let fact = model.input_fact(id)?;
                match fact.shape.as_concrete() {
                    Some(shape) => Ok(shape.to_vec()),
                    None => anyhow::bail!("network input {id} has a symbolic shape"),
                }
            })
            .collect()
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Tensor) -> anyhow::Result<Outputs> {
        let inner = self.0.run(tvec![TValue::from_const(Arc::new(input))])?;
        Ok(Outputs { inner })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    #[cfg(test)]
    pub(crate) fn from_tensors(tensors: impl IntoIterator<Item = Tensor>) -> Self {
        Self {
            inner: tensors
                .into_iter()
                .map(|t| TValue::from_const(Arc::new(t)))
                .collect(),
        }
    }

    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(WHITE), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_non_onnx_paths() {
        assert!(NeuralNetwork::from_path("model.tflite").is_err());
    }
}
