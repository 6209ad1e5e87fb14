//! デモ用モデルアーティファクトの生成ツール
//!
//! `models/` 以下に6種類の学習済みモデル相当のアーティファクトを
//! 決定的なパラメータで書き出します。学習は行いません。係数・分割は
//! King County データセットの典型的な傾向に合わせた手書きの値です。
//!
//! 実行: `cargo run --bin make_models`

use std::path::Path;

use anyhow::Result;

use house_price_dashboard_lib::ml::mlp::{CpuBackend, MlpConfig, MlpHandle};
use house_price_dashboard_lib::ml::stacking::BaseLearner;
use house_price_dashboard_lib::ml::tree::{RegressionTree, TreeNode};
use house_price_dashboard_lib::ml::{
    Bagging, GradientBoosting, LinearRegression, ObliviousTreeEnsemble, Stacking,
};
use house_price_dashboard_lib::model::registry::ModelKind;
use house_price_dashboard_lib::model::ModelMetadata;
use house_price_dashboard_lib::resolve_project_path;
use house_price_dashboard_lib::schema::NUM_FEATURES;

// 特徴量インデックス（正規順序）
const SQFT_LIVING: usize = 2;
const CONDITION: usize = 5;
const GRADE: usize = 6;
const SQFT_ABOVE: usize = 7;
const YR_BUILT: usize = 9;
const SQFT_LIVING15: usize = 11;

fn main() -> Result<()> {
    let models_dir = resolve_project_path("models");
    println!("デモアーティファクトを書き出します: {:?}", models_dir);

    write_linear(&models_dir)?;
    write_gradient_boosting(&models_dir)?;
    write_bagging(&models_dir)?;
    write_stacking(&models_dir)?;
    write_catboost(&models_dir)?;
    write_mlp(&models_dir)?;

    println!("完了: 6ファイルを書き出しました");
    Ok(())
}

/// King County の典型的な係数に寄せた線形回帰
///
/// 標準的な入力（3LDK・2500sqft・grade 8 など）で $500,000 前後に
/// なるように切片を調整してあります。
fn linear_coefficients() -> Vec<f64> {
    vec![
        -12_000.0, // bedrooms（面積一定なら部屋数増は減点）
        25_000.0,  // bathrooms
        165.0,     // sqft_living
        0.8,       // sqft_lot
        15_000.0,  // floors
        20_000.0,  // condition
        28_000.0,  // grade
        40.0,      // sqft_above
        35.0,      // sqft_basement
        -900.0,    // yr_built（築年の古さはリノベ前提で逆相関）
        18.0,      // yr_renovated
        45.0,      // sqft_living15
        -0.3,      // sqft_lot15
        0.0,       // day_posted
        500.0,     // month_posted
        1_200.0,   // year_posted
    ]
}

fn write_linear(dir: &Path) -> Result<()> {
    let model = LinearRegression::new(linear_coefficients(), -1_100_000.0);
    let path = dir.join(ModelKind::LinearRegression.artifact_file());
    model.save_json(&path)?;
    println!("  wrote {:?}", path);
    Ok(())
}

/// 深さ2の回帰木（根 + 左右の子分割、葉4枚）
fn depth2_tree(
    root: (usize, f64),
    left: (usize, f64),
    right: (usize, f64),
    leaves: [f64; 4],
    gain: f64,
) -> RegressionTree {
    RegressionTree {
        nodes: vec![
            TreeNode::Split {
                feature: root.0,
                threshold: root.1,
                left: 1,
                right: 2,
                gain,
            },
            TreeNode::Split {
                feature: left.0,
                threshold: left.1,
                left: 3,
                right: 4,
                gain: gain * 0.6,
            },
            TreeNode::Split {
                feature: right.0,
                threshold: right.1,
                left: 5,
                right: 6,
                gain: gain * 0.6,
            },
            TreeNode::Leaf { value: leaves[0] },
            TreeNode::Leaf { value: leaves[1] },
            TreeNode::Leaf { value: leaves[2] },
            TreeNode::Leaf { value: leaves[3] },
        ],
    }
}

fn write_gradient_boosting(dir: &Path) -> Result<()> {
    // 残差を段階的に埋める小さな木の列
    let model = GradientBoosting {
        num_features: NUM_FEATURES,
        base_score: 450_000.0,
        learning_rate: 0.1,
        trees: vec![
            depth2_tree(
                (SQFT_LIVING, 1_800.0),
                (GRADE, 7.0),
                (GRADE, 9.0),
                [-180_000.0, -60_000.0, 90_000.0, 420_000.0],
                9_000.0,
            ),
            depth2_tree(
                (GRADE, 8.0),
                (SQFT_LIVING15, 1_600.0),
                (SQFT_LIVING, 3_500.0),
                [-140_000.0, -40_000.0, 120_000.0, 560_000.0],
                7_500.0,
            ),
            depth2_tree(
                (YR_BUILT, 1_975.0),
                (CONDITION, 3.0),
                (SQFT_ABOVE, 2_400.0),
                [-90_000.0, -20_000.0, 40_000.0, 180_000.0],
                3_200.0,
            ),
            depth2_tree(
                (SQFT_LIVING15, 2_200.0),
                (SQFT_LIVING, 1_400.0),
                (GRADE, 10.0),
                [-70_000.0, -10_000.0, 50_000.0, 260_000.0],
                2_400.0,
            ),
        ],
    };
    let path = dir.join(ModelKind::GradientBoosting.artifact_file());
    model.save_bundle(&path, &ModelMetadata::new("Gradient Boosting"))?;
    println!("  wrote {:?}", path);
    Ok(())
}

fn write_bagging(dir: &Path) -> Result<()> {
    // ブートストラップ標本ごとの木（それぞれが価格水準を直接出す）
    let model = Bagging {
        num_features: NUM_FEATURES,
        trees: vec![
            depth2_tree(
                (SQFT_LIVING, 2_000.0),
                (GRADE, 7.0),
                (GRADE, 9.0),
                [310_000.0, 410_000.0, 520_000.0, 780_000.0],
                8_000.0,
            ),
            depth2_tree(
                (GRADE, 8.0),
                (SQFT_LIVING, 1_500.0),
                (SQFT_LIVING15, 2_600.0),
                [300_000.0, 420_000.0, 540_000.0, 820_000.0],
                7_000.0,
            ),
            depth2_tree(
                (SQFT_ABOVE, 1_800.0),
                (YR_BUILT, 1_970.0),
                (CONDITION, 3.0),
                [330_000.0, 400_000.0, 500_000.0, 610_000.0],
                5_000.0,
            ),
        ],
    };
    let path = dir.join(ModelKind::Bagging.artifact_file());
    model.save_bundle(&path, &ModelMetadata::new("Bagging"))?;
    println!("  wrote {:?}", path);
    Ok(())
}

fn write_stacking(dir: &Path) -> Result<()> {
    let model = Stacking {
        num_features: NUM_FEATURES,
        base_learners: vec![
            BaseLearner::Linear(LinearRegression::new(linear_coefficients(), -1_100_000.0)),
            BaseLearner::Tree(depth2_tree(
                (SQFT_LIVING, 2_000.0),
                (GRADE, 7.0),
                (GRADE, 9.0),
                [320_000.0, 430_000.0, 540_000.0, 790_000.0],
                6_000.0,
            )),
            BaseLearner::Tree(depth2_tree(
                (SQFT_LIVING15, 2_200.0),
                (YR_BUILT, 1_980.0),
                (SQFT_LIVING, 3_000.0),
                [350_000.0, 420_000.0, 520_000.0, 700_000.0],
                4_000.0,
            )),
        ],
        // ベース3本の加重平均 + わずかな補正
        meta: LinearRegression::new(vec![0.4, 0.35, 0.25], 8_000.0),
    };
    let path = dir.join(ModelKind::Stacking.artifact_file());
    model.save_json(&path)?;
    println!("  wrote {:?}", path);
    Ok(())
}

fn write_catboost(dir: &Path) -> Result<()> {
    // 対称木4本。各レベルは (特徴量, しきい値, 寄与額)
    let trees: [[(usize, f64, f64); 3]; 4] = [
        [
            (SQFT_LIVING, 1_900.0, 55_000.0),
            (GRADE, 8.0, 48_000.0),
            (YR_BUILT, 1_978.0, -18_000.0),
        ],
        [
            (SQFT_LIVING15, 2_100.0, 30_000.0),
            (CONDITION, 3.0, 14_000.0),
            (SQFT_ABOVE, 2_200.0, 22_000.0),
        ],
        [
            (GRADE, 10.0, 60_000.0),
            (SQFT_LIVING, 3_400.0, 45_000.0),
            (YR_BUILT, 2_000.0, 12_000.0),
        ],
        [
            (SQFT_LIVING, 1_200.0, 26_000.0),
            (SQFT_LIVING15, 2_800.0, 20_000.0),
            (GRADE, 6.0, 16_000.0),
        ],
    ];

    let depth = 3;
    let mut split_features = Vec::new();
    let mut split_borders = Vec::new();
    let mut leaf_values = Vec::new();

    for levels in trees {
        for (feature, border, _) in levels {
            split_features.push(feature);
            split_borders.push(border as f32);
        }
        // 葉インデックスのビットに対応するレベル寄与を合成
        for leaf in 0..(1usize << depth) {
            let mut value = 0.0f64;
            for (level, (_, _, delta)) in levels.iter().enumerate() {
                if leaf & (1 << level) != 0 {
                    value += delta;
                } else {
                    value -= delta * 0.4;
                }
            }
            leaf_values.push(value as f32);
        }
    }

    let model = ObliviousTreeEnsemble {
        num_features: NUM_FEATURES,
        depth,
        tree_count: 4,
        split_features,
        split_borders,
        leaf_values,
        scale: 1.0,
        bias: 455_000.0,
    };
    let path = dir.join(ModelKind::CatBoost.artifact_file());
    model.save_safetensors(&path)?;
    println!("  wrote {:?}", path);
    Ok(())
}

fn write_mlp(dir: &Path) -> Result<()> {
    use burn::tensor::backend::Backend;

    // 初期化を決定的にする
    CpuBackend::seed(42);

    let device = burn::backend::ndarray::NdArrayDevice::default();
    let model = MlpConfig::new(NUM_FEATURES).init::<CpuBackend>(&device);

    // King County データセットのおおよその統計で標準化
    let means = vec![
        3.4, 2.1, 2_080.0, 15_100.0, 1.5, 3.4, 7.7, 1_790.0, 290.0, 1_971.0, 85.0, 1_990.0,
        12_770.0, 15.7, 6.6, 2_014.5,
    ];
    let stds = vec![
        0.9, 0.8, 920.0, 41_000.0, 0.54, 0.65, 1.2, 830.0, 440.0, 29.0, 400.0, 685.0, 27_300.0,
        8.6, 3.1, 0.5,
    ];

    let metadata = ModelMetadata::new("Neural Network").with_scaler(means, stds);
    let path = dir.join(ModelKind::NeuralNetwork.artifact_file());
    MlpHandle::save_bundle(&model, &metadata, &path)?;
    println!("  wrote {:?}", path);
    Ok(())
}
