/// 外部图片 ID（如 Danbooru 的 post ID），索引只依赖其相等性和哈希
pub type PostId = String;

/// 查询打分所用的类型，info 表中的 avgl 镜像也用它存储
pub type Score = f32;
