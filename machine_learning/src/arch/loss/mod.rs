mod loss_fn;

pub use loss_fn::{CrossEntropy, Loss, LossFn, Mse};
