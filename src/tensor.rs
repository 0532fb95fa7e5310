// 该文件是 Kanjian （看见） 项目的一部分。
// src/tensor.rs - 推理输出张量定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量元素数量不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际为 {actual}")]
  ElementCount {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 张量数据，推理引擎的输出可能是浮点或整型
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
  F32(Box<[f32]>),
  I64(Box<[i64]>),
}

impl TensorData {
  pub fn len(&self) -> usize {
    match self {
      TensorData::F32(data) => data.len(),
      TensorData::I64(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 推理引擎的一个输出头：扁平数据加形状
#[derive(Debug, Clone, PartialEq)]
pub struct TensorOutput {
  data: TensorData,
  shape: Box<[usize]>,
}

impl TensorOutput {
  pub fn new(data: TensorData, shape: impl Into<Box<[usize]>>) -> Result<Self, TensorError> {
    let shape = shape.into();
    let expected = shape.iter().product::<usize>();
    if expected != data.len() {
      return Err(TensorError::ElementCount {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { data, shape })
  }

  pub fn from_f32(data: Vec<f32>, shape: impl Into<Box<[usize]>>) -> Result<Self, TensorError> {
    Self::new(TensorData::F32(data.into_boxed_slice()), shape)
  }

  pub fn from_i64(data: Vec<i64>, shape: impl Into<Box<[usize]>>) -> Result<Self, TensorError> {
    Self::new(TensorData::I64(data.into_boxed_slice()), shape)
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &TensorData {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// 按扁平下标读取一个元素，整型数据转换为浮点
  #[inline]
  pub fn value(&self, index: usize) -> f32 {
    match &self.data {
      TensorData::F32(data) => data[index],
      TensorData::I64(data) => data[index] as f32,
    }
  }

  /// 浮点数据的切片视图，整型张量返回 None
  pub fn as_f32(&self) -> Option<&[f32]> {
    match &self.data {
      TensorData::F32(data) => Some(data),
      TensorData::I64(_) => None,
    }
  }

  /// 把张量视为 [rows, cols] 矩阵（忽略批次维度），形状不符时 panic
  pub fn matrix(&self, owner: &str) -> Matrix<'_> {
    match *self.shape {
      [1, rows, cols] | [rows, cols] => Matrix {
        tensor: self,
        rows,
        cols,
      },
      _ => panic!(
        "{}: 期望二维输出（可带批次维度），实际形状为 {:?}",
        owner, self.shape
      ),
    }
  }

  /// 把张量视为长度为 N 的向量（忽略批次维度），形状不符时 panic
  pub fn vector(&self, owner: &str) -> usize {
    match *self.shape {
      [1, n] | [n] => n,
      _ => panic!(
        "{}: 期望一维输出（可带批次维度），实际形状为 {:?}",
        owner, self.shape
      ),
    }
  }
}

/// 行主序二维视图
#[derive(Debug, Clone, Copy)]
pub struct Matrix<'a> {
  tensor: &'a TensorOutput,
  pub rows: usize,
  pub cols: usize,
}

impl Matrix<'_> {
  #[inline]
  pub fn at(&self, row: usize, col: usize) -> f32 {
    self.tensor.value(row * self.cols + col)
  }

  /// 第 row 行中 [from, from + len) 区间内的最大值及其相对下标，
  /// 相等时保留最先出现的
  pub fn row_argmax(&self, row: usize, from: usize, len: usize) -> (usize, f32) {
    self.argmax((0..len).map(|i| self.at(row, from + i)))
  }

  /// 第 col 列中 [from, from + len) 区间内的最大值及其相对下标
  pub fn col_argmax(&self, col: usize, from: usize, len: usize) -> (usize, f32) {
    self.argmax((0..len).map(|i| self.at(from + i, col)))
  }

  fn argmax(&self, values: impl Iterator<Item = f32>) -> (usize, f32) {
    values
      .enumerate()
      .fold((0, f32::NEG_INFINITY), |(best_idx, best), (idx, value)| {
        if value > best {
          (idx, value)
        } else {
          (best_idx, best)
        }
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_mismatched_element_count() {
    let err = TensorOutput::from_f32(vec![0.0; 5], vec![1, 2, 3]).unwrap_err();
    assert_eq!(
      err,
      TensorError::ElementCount {
        shape: vec![1, 2, 3],
        expected: 6,
        actual: 5
      }
    );
  }

  #[test]
  fn views_ignore_leading_batch_dimension() {
    let t = TensorOutput::from_f32(vec![0.0; 6], vec![1, 2, 3]).unwrap();
    let m = t.matrix("test");
    assert_eq!((m.rows, m.cols), (2, 3));

    let t = TensorOutput::from_f32(vec![0.0; 7], vec![1, 7]).unwrap();
    let m = t.matrix("test");
    assert_eq!((m.rows, m.cols), (1, 7));
    assert_eq!(t.vector("test"), 7);

    let t = TensorOutput::from_f32(vec![0.0; 3], vec![3]).unwrap();
    assert_eq!(t.vector("test"), 3);
  }

  #[test]
  fn integer_tensors_read_as_float() {
    let t = TensorOutput::from_i64(vec![3, 7], vec![1, 2]).unwrap();
    assert_eq!(t.value(1), 7.0);
    assert!(t.as_f32().is_none());
  }

  #[test]
  fn argmax_keeps_first_of_equal_values() {
    let t = TensorOutput::from_f32(vec![0.1, 0.8, 0.8, 0.2], vec![1, 1, 4]).unwrap();
    let m = t.matrix("test");
    assert_eq!(m.row_argmax(0, 0, 4), (1, 0.8));
    assert_eq!(m.row_argmax(0, 2, 2), (0, 0.8));
  }

  #[test]
  #[should_panic(expected = "期望二维输出")]
  fn matrix_view_panics_on_wrong_rank() {
    let t = TensorOutput::from_f32(vec![0.0; 8], vec![2, 2, 2]).unwrap();
    let _ = t.matrix("test");
  }
}
