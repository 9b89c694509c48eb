use utoipa::OpenApi;

use crate::{api, badge};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::photo_preview,
        api::photo_upload,
        api::photo_delete,
        api::serve_upload,
        api::render_badge,
    ),
    components(
        schemas(
            api::HealthResponse,
            api::PhotoPreviewRequest,
            api::PhotoUploadRequest,
            api::PhotoUploadResponse,
            api::BadgeRenderRequest,
            badge::layout::BadgeRecord,
            badge::crop::CropSelection,
        )
    ),
    tags(
        (name = "badgegen", description = "Badge composition and export API")
    )
)]
pub struct ApiDoc;
