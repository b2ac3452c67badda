//! Face concealment engine.
//!
//! Detected faces are concealed with a masked blur, mosaic or pixelate
//! effect unless they match a whitelisted identity. Videos run through an
//! ordered, concurrent frame pipeline; the source audio is restored with
//! the ffmpeg CLI afterwards.

pub mod shared {
    pub mod constants;
    pub mod face;
    pub mod frame;
    pub mod time_range;
    pub mod video_metadata;
}

pub mod whitelist {
    pub mod domain {
        pub mod whitelist;
    }
}

pub mod concealment {
    pub mod domain {
        pub mod concealment_config;
        pub mod face_concealer;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod image_reader;
        pub mod image_writer;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure;
}

pub mod document {
    pub mod domain {
        pub mod document_container;
    }
}

pub mod assembly {
    pub mod domain {
        pub mod media_assembler;
        pub mod remux_tool;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod build_whitelist_use_case;
    pub mod conceal_document_use_case;
    pub mod conceal_image_use_case;
    pub mod conceal_video_use_case;
    pub mod frame_processor;
    pub mod infrastructure;
    pub mod job_state;
    pub mod pipeline_executor;
    pub mod pipeline_logger;
}
