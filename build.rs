use vergen::EmitBuilder;

fn main() {
    // 生成构建信息（用于 --version 输出）
    EmitBuilder::builder()
        .all_build()
        .all_git()
        .emit()
        .expect("Failed to generate build information");
}
