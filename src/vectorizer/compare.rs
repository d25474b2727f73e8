use num::Num;

pub trait Compare<N>
where
    N: Num + Copy,
{
    /// ピアソン相関係数
    /// r(a, b) = (Σ(a_i * b_i) - Σa_i * Σb_i / n)
    ///         / sqrt((Σa_i^2 - (Σa_i)^2 / n) * (Σb_i^2 - (Σb_i)^2 / n))
    ///
    /// `None` when the coefficient is undefined: empty vectors, or either
    /// vector has zero variance (constant).
    fn pearson(vec: &[N], other: &[N]) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompare;

impl<N> Compare<N> for DefaultCompare
where
    N: Num + Copy + Into<f64>,
{
    #[inline]
    fn pearson(vec: &[N], other: &[N]) -> Option<f64> {
        debug_assert_eq!(
            vec.len(),
            other.len(),
            "Vectors must be of the same length to compute a correlation."
        );
        let size = vec.len().min(other.len());
        if size == 0 {
            return None;
        }
        let n = size as f64;

        let mut sum1 = 0_f64;
        let mut sum2 = 0_f64;
        let mut sum_sq1 = 0_f64;
        let mut sum_sq2 = 0_f64;
        let mut prod_sum = 0_f64;
        for (&a, &b) in vec.iter().zip(other.iter()) {
            let (a, b): (f64, f64) = (a.into(), b.into());
            sum1 += a;
            sum2 += b;
            sum_sq1 += a * a;
            sum_sq2 += b * b;
            prod_sum += a * b;
        }

        let var1 = sum_sq1 - sum1 * sum1 / n;
        let var2 = sum_sq2 - sum2 * sum2 / n;
        // also rejects NaN
        if !(var1 > 0.0 && var2 > 0.0) {
            return None;
        }
        let num = prod_sum - sum1 * sum2 / n;
        Some(num / (var1 * var2).sqrt())
    }
}
